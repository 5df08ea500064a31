//! Quota accounting and the approval-request lifecycle (spec §4.E).
//!
//! Quota window accounting is grounded on `ferrex-core::auth::rate_limit`'s
//! window-based usage shape, generalized from per-IP sliding windows to
//! per-user daily/weekly-rolling/monthly usage. The request state machine is
//! grounded on `ferrex-core::scan::orchestration::job::JobState`-style
//! one-way transitions enforced by the type
//! ([`relaybridge_model::ApprovalRequest::resolve`]), not by scattered
//! runtime checks.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use thiserror::Error;
use tracing::{info, warn};

use relaybridge_contracts::persistence::{ApprovalRepository, QuotaRepository, RepositoryError};
use relaybridge_model::{
    ApprovalId, ApprovalRequest, ApprovalStatus, ApprovalTrigger, ContentType, MonthEndPolicy,
    QuotaRecord, QuotaStatus, QuotaWindow, RoutingBundle, RoutingDecision, UsageEvent, User, UserId,
};

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("approval request {0} is not pending")]
    NotPending(ApprovalId),
}

pub type Result<T> = std::result::Result<T, ApprovalError>;

/// The window qualifier used in a quota-exceeded reason (spec §8 scenario 3:
/// `"monthly quota exceeded (3/3)"`).
fn window_label(window: QuotaWindow) -> &'static str {
    match window {
        QuotaWindow::Daily => "daily",
        QuotaWindow::WeeklyRolling { .. } => "weekly-rolling",
        QuotaWindow::Monthly { .. } => "monthly",
    }
}

/// Computes the start of the current accounting window for `window` as of
/// `now` (spec §4.E "Quota evaluation").
pub fn window_start(window: QuotaWindow, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match window {
        QuotaWindow::Daily => Some(now - Duration::hours(24)),
        QuotaWindow::WeeklyRolling { days } => Some(now - Duration::days(days as i64)),
        QuotaWindow::Monthly { reset_day, month_end_policy } => {
            monthly_reset_at(now, reset_day, month_end_policy)
        }
    }
}

/// Resolves the most recent monthly reset instant at or before `now`,
/// honoring the month-end policy for months shorter than `reset_day` (spec
/// §3, §8 "Boundary behaviors").
fn monthly_reset_at(now: DateTime<Utc>, reset_day: u8, policy: MonthEndPolicy) -> Option<DateTime<Utc>> {
    let mut year = now.year();
    let mut month = now.month();
    // Walk backward at most five years looking for the most recent reset
    // instant at or before `now`; `SkipMonth` can skip arbitrarily many
    // months in a row but never more than once per year for a given day.
    for _ in 0..60 {
        if let Some(reset) = reset_for_month(year, month, reset_day, policy) {
            if reset <= now {
                return Some(reset);
            }
        }
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    None
}

fn reset_for_month(year: i32, month: u32, reset_day: u8, policy: MonthEndPolicy) -> Option<DateTime<Utc>> {
    let days_in_month = days_in_month(year, month);
    let day = reset_day as u32;
    if day <= days_in_month {
        return Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single();
    }
    match policy {
        MonthEndPolicy::LastDay => Utc.with_ymd_and_hms(year, month, days_in_month, 0, 0, 0).single(),
        MonthEndPolicy::SkipMonth => None,
        MonthEndPolicy::NextMonth => {
            let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
            Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single()
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid calendar month");
    let first_of_this = NaiveDate::from_ymd_opt(year, month, 1).expect("valid calendar month");
    (first_of_next - first_of_this).num_days() as u32
}

/// Evaluates `record`'s usage since its window start and reports whether it
/// is exceeded (spec §4.E: "exceeded if `usage >= limit`").
pub async fn evaluate_quota(
    repo: &dyn QuotaRepository,
    record: &QuotaRecord,
    now: DateTime<Utc>,
) -> Result<Option<QuotaStatus>> {
    let Some(since) = window_start(record.window, now) else {
        // SkipMonth with no reset yet this cycle: treat as unconstrained.
        return Ok(None);
    };
    let usage = repo.usage_since(record.user_id, record.content_type, since).await?;
    Ok(Some(QuotaStatus { usage, limit: record.limit }))
}

/// Determines whether an approval is required for `decision`, per spec
/// §4.E "Trigger resolution": the user's `requires_approval` flag, the
/// router's own `require_approval` decision, or an exceeded quota the user
/// cannot bypass.
pub async fn resolve_trigger(
    user: &User,
    content_type: ContentType,
    decision: RoutingDecision,
    quotas: &[QuotaRecord],
    quota_repo: &dyn QuotaRepository,
    now: DateTime<Utc>,
) -> Result<RoutingDecision> {
    if let RoutingDecision::RequireApproval(_) = &decision {
        return Ok(decision);
    }
    let RoutingDecision::Route(bundle) = decision else {
        return Ok(decision);
    };

    if user.requires_approval {
        return Ok(crate::routing::require_approval(
            RoutingDecision::Route(bundle),
            "user requires approval".to_string(),
            ApprovalTrigger::UserRequiresApproval,
        ));
    }

    for record in quotas.iter().filter(|q| q.content_type == content_type) {
        if record.bypass_approval {
            continue;
        }
        if let Some(status) = evaluate_quota(quota_repo, record, now).await? {
            if status.is_exceeded() {
                let reason = format!("{} quota exceeded ({status})", window_label(record.window));
                return Ok(crate::routing::require_approval(
                    RoutingDecision::Route(bundle),
                    reason,
                    ApprovalTrigger::QuotaExceeded,
                ));
            }
        }
    }

    Ok(RoutingDecision::Route(bundle))
}

/// Creates (or reuses an expired duplicate for) a pending approval request,
/// per spec §4.E invariant 1 and §6 "expired-duplicate reuse".
pub async fn request_approval(
    repo: &dyn ApprovalRepository,
    user_id: UserId,
    content_type: ContentType,
    content_title: String,
    content_key: String,
    content_guids: Vec<relaybridge_model::Guid>,
    reason: String,
    triggered_by: ApprovalTrigger,
    proposed_routing: RoutingBundle,
    expires_at: Option<DateTime<Utc>>,
) -> Result<ApprovalRequest> {
    let now = Utc::now();
    let request = ApprovalRequest {
        id: ApprovalId::new(),
        user_id,
        content_type,
        content_title,
        content_key,
        content_guids,
        proposed_router_decision: proposed_routing,
        triggered_by,
        approval_reason: Some(reason),
        status: ApprovalStatus::Pending,
        approved_by: None,
        approval_notes: None,
        expires_at,
        created_at: now,
        updated_at: now,
    };
    Ok(repo.create_or_reuse(request).await?)
}

/// Approves `request`, optionally auto-approving any other pending request
/// whose content GUIDs overlap (spec §4.E invariant 2 "cross-user
/// fulfillment"). Does not itself perform downstream submission — callers
/// submit the stored `proposed_router_decision` after this returns.
pub async fn approve_with_fulfillment(
    repo: &dyn ApprovalRepository,
    request_id: ApprovalId,
    approved_by: Option<UserId>,
) -> Result<(ApprovalRequest, Vec<ApprovalRequest>)> {
    let mut request = repo.get(request_id).await?;
    request
        .resolve(ApprovalStatus::Approved, approved_by, None)
        .map_err(|_| ApprovalError::NotPending(request_id))?;
    repo.update(&request).await?;

    let pending = repo.list_pending().await?;
    let mut fulfilled = Vec::new();
    for mut other in pending {
        if other.id == request.id {
            continue;
        }
        if request.shares_content_with(&other.content_guids) {
            if other
                .resolve(
                    ApprovalStatus::Approved,
                    approved_by,
                    Some("content already available".to_string()),
                )
                .is_ok()
            {
                repo.update(&other).await?;
                info!(request_id = %other.id, "auto-approved via cross-user fulfillment");
                fulfilled.push(other);
            }
        }
    }

    Ok((request, fulfilled))
}

/// Rejects a pending request; never touches anything already submitted
/// (spec §4.E invariant 3).
pub async fn reject(repo: &dyn ApprovalRepository, request_id: ApprovalId, notes: Option<String>) -> Result<ApprovalRequest> {
    let mut request = repo.get(request_id).await?;
    request
        .resolve(ApprovalStatus::Rejected, None, notes)
        .map_err(|_| ApprovalError::NotPending(request_id))?;
    repo.update(&request).await?;
    Ok(request)
}

/// Expires every pending request past its `expires_at` (spec §4.E
/// "Maintenance").
pub async fn expire_overdue(repo: &dyn ApprovalRepository, now: DateTime<Utc>) -> Result<u32> {
    let mut expired = 0;
    for mut request in repo.list_pending().await? {
        if request.expires_at.is_some_and(|at| at <= now) {
            if request.resolve(ApprovalStatus::Expired, None, None).is_ok() {
                repo.update(&request).await?;
                expired += 1;
            } else {
                warn!(request_id = %request.id, "could not expire already-terminal request");
            }
        }
    }
    Ok(expired)
}

/// Records one unit of usage against `record` after a successful submission
/// (spec §4.E invariant 2 "records quota usage").
pub async fn record_usage(repo: &dyn QuotaRepository, user_id: UserId, content_type: ContentType) -> Result<()> {
    repo.record_usage(&UsageEvent { user_id, content_type, ts: Utc::now() }).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_day_policy_resets_on_feb_28_in_common_year() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 1).unwrap();
        let reset = monthly_reset_at(now, 31, MonthEndPolicy::LastDay).unwrap();
        assert_eq!(reset.day(), 28);
        assert_eq!(reset.month(), 2);
    }

    #[test]
    fn skip_month_policy_has_no_reset_in_february() {
        let feb_start = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();
        assert!(reset_for_month(2026, 2, 31, MonthEndPolicy::SkipMonth).is_none());
        // Falls back to January's reset instead.
        let reset = monthly_reset_at(feb_start, 31, MonthEndPolicy::SkipMonth).unwrap();
        assert_eq!(reset.month(), 1);
    }

    #[test]
    fn next_month_policy_resets_on_first() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 1).unwrap();
        let reset = monthly_reset_at(now, 31, MonthEndPolicy::NextMonth).unwrap();
        assert_eq!(reset.day(), 1);
        assert_eq!(reset.month(), 3);
    }

    #[test]
    fn quota_status_exceeded_at_limit() {
        let status = QuotaStatus { usage: 3, limit: 3 };
        assert!(status.is_exceeded());
        let status = QuotaStatus { usage: 2, limit: 3 };
        assert!(!status.is_exceeded());
    }
}
