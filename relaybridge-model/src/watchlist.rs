//! Watchlist item entity and its status state machine (spec §3, §8).

use chrono::{DateTime, Utc};

use crate::guid::Guid;
use crate::ids::{InstanceId, UserId, WatchlistItemId};

/// Content kind a watchlist item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContentType {
    Movie,
    Show,
}

/// Lifecycle status of a watchlist item.
///
/// Invariant (spec §3, §8): status only advances along
/// `Pending -> Requested -> Grabbed -> Notified`; downgrades from `Notified`
/// are forbidden except through an explicit reset. [`WatchlistStatus::advance_to`]
/// is the single authority for enforcing this — no caller should mutate the
/// field directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WatchlistStatus {
    Pending = 0,
    Requested = 1,
    Grabbed = 2,
    Notified = 3,
}

/// Rejected attempt to move a watchlist item's status backwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot downgrade watchlist status from {from:?} to {to:?}")]
pub struct StatusDowngradeError {
    pub from: WatchlistStatus,
    pub to: WatchlistStatus,
}

impl WatchlistStatus {
    /// Attempts to move to `target`, rejecting any backwards transition.
    ///
    /// Equal-to-current is accepted as a no-op so reconcile passes that
    /// observe no change can call this unconditionally.
    pub fn advance_to(self, target: WatchlistStatus) -> Result<WatchlistStatus, StatusDowngradeError> {
        if target >= self {
            Ok(target)
        } else {
            Err(StatusDowngradeError { from: self, to: target })
        }
    }
}

/// Upstream series completion state (Sonarr-side, shows only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SeriesStatus {
    Continuing,
    Ended,
}

/// Downstream availability state (Radarr-side, movies only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MovieAvailability {
    Available,
    Unavailable,
}

/// A user's intent that a piece of content should be acquired.
///
/// Invariant (spec §3): `(user_id, key)` is unique.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatchlistItem {
    pub id: WatchlistItemId,
    pub user_id: UserId,
    /// External id from the watchlist source (e.g. a Plex rating key).
    pub key: String,
    pub title: String,
    pub content_type: ContentType,
    pub thumb: Option<String>,
    pub added: Option<DateTime<Utc>>,
    pub guids: Vec<Guid>,
    pub genres: Vec<String>,
    pub status: WatchlistStatus,
    pub series_status: Option<SeriesStatus>,
    pub movie_status: Option<MovieAvailability>,
    pub sonarr_instance_id: Option<InstanceId>,
    pub radarr_instance_id: Option<InstanceId>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchlistItem {
    /// Downstream manager family this item is routed through.
    pub fn target_type(&self) -> DownstreamKind {
        match self.content_type {
            ContentType::Movie => DownstreamKind::Radarr,
            ContentType::Show => DownstreamKind::Sonarr,
        }
    }
}

/// Downstream manager family (spec §3/§6: Sonarr-like vs Radarr-like).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DownstreamKind {
    Sonarr,
    Radarr,
}

/// A single entry appended by the reconciler when it observes downstream
/// progress it must not apply to the live status (spec §4.F "backfill").
///
/// Supplemented type: spec.md describes the backfill behavior but does not
/// name a record for it; without one, the dated history the reconciler
/// produces would have nowhere to live.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatchlistStatusHistoryEntry {
    pub watchlist_item_id: WatchlistItemId,
    pub status: WatchlistStatus,
    /// The timestamp this entry is dated to — spec §4.F: "dated `added`".
    pub observed_at: DateTime<Utc>,
    pub backfilled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_advances_forward() {
        assert_eq!(
            WatchlistStatus::Pending.advance_to(WatchlistStatus::Requested),
            Ok(WatchlistStatus::Requested)
        );
    }

    #[test]
    fn status_rejects_downgrade() {
        let err = WatchlistStatus::Notified
            .advance_to(WatchlistStatus::Requested)
            .unwrap_err();
        assert_eq!(err.from, WatchlistStatus::Notified);
        assert_eq!(err.to, WatchlistStatus::Requested);
    }

    #[test]
    fn status_allows_same_state_noop() {
        assert_eq!(
            WatchlistStatus::Grabbed.advance_to(WatchlistStatus::Grabbed),
            Ok(WatchlistStatus::Grabbed)
        );
    }
}
