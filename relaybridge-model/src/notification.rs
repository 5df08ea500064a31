//! Notification records and de-duplication keys (spec §3, §4.H).

use chrono::{DateTime, Utc};

use crate::ids::{NotificationId, UserId, WatchlistItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NotificationType {
    Movie,
    Episode,
    Season,
    WatchlistAdd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SentToChannels {
    pub chat: bool,
    pub email: bool,
    pub webhook: bool,
    pub push: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NotificationStatus {
    Sent,
    Suppressed,
    Failed,
}

/// A dispatched (or suppressed) notification (spec §3).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub watchlist_item_id: Option<WatchlistItemId>,
    pub user_id: Option<UserId>,
    pub notification_type: NotificationType,
    pub title: String,
    /// Normalized to an explicit `None`, never conflated with `Some(0)`
    /// (spec §9 Open Question iii).
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub sent_to: SentToChannels,
    pub notification_status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

/// The primary de-dup key for a notification (spec §3).
///
/// `season`/`episode` participate as `Option<u32>` directly so that `None`
/// and `Some(0)` are distinct keys, per spec §9 Open Question iii.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationDedupeKey {
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl NotificationRecord {
    pub fn dedupe_key(&self, user_id: UserId) -> NotificationDedupeKey {
        NotificationDedupeKey {
            user_id,
            notification_type: self.notification_type,
            title: self.title.clone(),
            season: self.season,
            episode: self.episode,
        }
    }
}
