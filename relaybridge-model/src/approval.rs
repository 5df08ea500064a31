//! Approval request entity and its state machine (spec §3, §4.E).

use chrono::{DateTime, Utc};

use crate::guid::Guid;
use crate::ids::{ApprovalId, UserId};
use crate::routing::{ApprovalTrigger, RoutingBundle};
use crate::watchlist::ContentType;

/// Terminal-or-not state of an approval request.
///
/// Invariant (spec §3, §4.E, §8): states form `Pending -> {Approved,
/// Rejected, Expired}`; terminal statuses are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// Attempt to mutate an approval request that is already in a terminal
/// state (spec §4.E invariant 3: "rejection and deletion never undo already
/// -submitted routings").
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("approval request is already terminal ({0:?})")]
pub struct ApprovalTerminalError(pub ApprovalStatus);

/// A pending-or-resolved request for an operator (or policy) to approve
/// acquiring content (spec §3).
///
/// Invariant: at most one `Pending` request per `(user_id, content_key)` at
/// any instant (spec §4.E, §5, §8).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub user_id: UserId,
    pub content_type: ContentType,
    pub content_title: String,
    pub content_key: String,
    pub content_guids: Vec<Guid>,
    pub proposed_router_decision: RoutingBundle,
    pub triggered_by: ApprovalTrigger,
    pub approval_reason: Option<String>,
    pub status: ApprovalStatus,
    pub approved_by: Option<UserId>,
    pub approval_notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Resolves the request to a terminal status, refusing to re-resolve an
    /// already-terminal one.
    pub fn resolve(
        &mut self,
        status: ApprovalStatus,
        approved_by: Option<UserId>,
        notes: Option<String>,
    ) -> Result<(), ApprovalTerminalError> {
        if self.status.is_terminal() {
            return Err(ApprovalTerminalError(self.status));
        }
        self.status = status;
        self.approved_by = approved_by;
        self.approval_notes = notes;
        Ok(())
    }

    /// Whether `other_guids` overlaps this request's content GUIDs — the
    /// cross-user fulfillment match key (spec §4.E invariant 2).
    pub fn shares_content_with(&self, other_guids: &[Guid]) -> bool {
        crate::guid::guid_sets_intersect(&self.content_guids, other_guids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ApprovalRequest {
        ApprovalRequest {
            id: ApprovalId::new(),
            user_id: UserId::new(),
            content_type: ContentType::Movie,
            content_title: "Example".into(),
            content_key: "42".into(),
            content_guids: vec![Guid::parse("tmdb:42").unwrap()],
            proposed_router_decision: RoutingBundle::default(),
            triggered_by: ApprovalTrigger::QuotaExceeded,
            approval_reason: None,
            status: ApprovalStatus::Pending,
            approved_by: None,
            approval_notes: None,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn resolve_once_then_refuses_again() {
        let mut req = sample();
        req.resolve(ApprovalStatus::Approved, Some(UserId::new()), None)
            .unwrap();
        assert_eq!(req.status, ApprovalStatus::Approved);
        let err = req
            .resolve(ApprovalStatus::Rejected, None, None)
            .unwrap_err();
        assert_eq!(err.0, ApprovalStatus::Approved);
    }

    #[test]
    fn shares_content_detects_guid_overlap() {
        let req = sample();
        assert!(req.shares_content_with(&[Guid::parse("tmdb:42").unwrap()]));
        assert!(!req.shares_content_with(&[Guid::parse("tmdb:99").unwrap()]));
    }
}
