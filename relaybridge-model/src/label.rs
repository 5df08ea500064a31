//! Label tracking rows for library label sync (spec §3, §4.I).

use crate::ids::WatchlistItemId;

/// Tracks one label the system applied to one library entity, so cleanup can
/// safely remove only labels it owns (spec §3: "exists only for labels the
/// system applied, enabling safe cleanup").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelTracking {
    pub watchlist_id: WatchlistItemId,
    pub plex_rating_key: String,
    pub label_applied: String,
}

/// Policy applied to a label when its owning user is removed (spec §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RemovedUserPolicy {
    Remove,
    Keep,
    SpecialLabel,
}
