//! Tracking state for rolling-monitoring expansion (spec §4.D, §4.F).
//!
//! Supplemented type: spec.md requires "a tracking record...so the
//! reconciler can expand monitoring later" (§4.D) and an inactivity
//! auto-reset (§4.F) but does not name either as a persisted type.

use chrono::{DateTime, Utc};

use crate::ids::WatchlistItemId;
use crate::instance::SeasonMonitoring;

/// Which rolling policy a show is tracked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum RollingMonitoringKind {
    PilotRolling,
    FirstSeasonRolling,
}

impl RollingMonitoringKind {
    pub fn starting_monitor(self) -> SeasonMonitoring {
        match self {
            RollingMonitoringKind::PilotRolling => SeasonMonitoring::Pilot,
            RollingMonitoringKind::FirstSeasonRolling => SeasonMonitoring::FirstSeason,
        }
    }
}

/// Per-show rolling-monitoring state, persisted so the reconciler can expand
/// the monitored range as a user's session progress advances, and reset it
/// after a configured period of inactivity.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollingMonitoringState {
    pub watchlist_item_id: WatchlistItemId,
    pub kind: RollingMonitoringKind,
    /// Highest season number currently monitored.
    pub current_season: u32,
    pub last_expanded_at: Option<DateTime<Utc>>,
    /// Last time session-progress input was observed for this show.
    pub last_session_progress_at: Option<DateTime<Utc>>,
}
