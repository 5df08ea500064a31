//! Per-user content quotas and usage accounting (spec §3, §4.E, §8).

use chrono::{DateTime, Utc};

use crate::ids::UserId;
use crate::watchlist::ContentType;

/// Quota measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum QuotaWindow {
    Daily,
    /// Rolling window of `days` days.
    WeeklyRolling { days: u32 },
    /// Resets on `reset_day` of the month, per `month_end_policy`.
    Monthly { reset_day: u8, month_end_policy: MonthEndPolicy },
}

/// How a monthly reset day that doesn't exist in a given month is handled
/// (spec §3, §8 "Boundary behaviors").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum MonthEndPolicy {
    /// Reset on the month's last day instead.
    LastDay,
    /// Skip the reset for that month entirely.
    SkipMonth,
    /// Reset falls on the 1st of the following month.
    NextMonth,
}

/// A configured cap for one `(user, content_type)` pair (spec §3).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuotaRecord {
    pub user_id: UserId,
    pub content_type: ContentType,
    pub window: QuotaWindow,
    pub limit: u32,
    pub bypass_approval: bool,
}

/// A single content acquisition counted against a quota (spec §3
/// "append-only `usage_event`").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsageEvent {
    pub user_id: UserId,
    pub content_type: ContentType,
    pub ts: DateTime<Utc>,
}

/// Result of evaluating a quota against current usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub usage: u32,
    pub limit: u32,
}

impl QuotaStatus {
    /// A quota is exceeded when `usage >= limit` (spec §4.E).
    pub fn is_exceeded(self) -> bool {
        self.usage >= self.limit
    }
}

impl std::fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.usage, self.limit)
    }
}
