//! Persisted scheduled-job rows (spec §3, §4.G).

use chrono::{DateTime, Utc};

use crate::ids::ScheduledJobId;

/// Job trigger configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum JobTrigger {
    Interval {
        days: u32,
        hours: u32,
        minutes: u32,
        seconds: u32,
        run_immediately: bool,
    },
    Cron {
        /// 6-field `sec min hr dom mon dow` expression (spec §4.G).
        expression: String,
    },
}

/// Outcome of the most recent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunStatus {
    Completed,
    Failed,
    Pending,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LastRun {
    pub time: DateTime<Utc>,
    pub status: RunStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NextRun {
    pub time: DateTime<Utc>,
    /// True when `time` is a best-effort estimate (e.g. before the first run
    /// of a `run_immediately: false` interval job).
    pub estimated: bool,
}

/// A persisted job row (spec §3).
///
/// Invariant (spec §6 scheduler API validation): `name` is unique; a cron
/// job's `expression` is non-empty; an interval job has at least one
/// positive unit.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduledJob {
    pub id: ScheduledJobId,
    pub name: String,
    pub trigger: JobTrigger,
    pub enabled: bool,
    pub last_run: Option<LastRun>,
    pub next_run: Option<NextRun>,
}
