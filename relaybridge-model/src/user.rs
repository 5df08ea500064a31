//! The watchlist-owning `User` entity (spec §3).

use chrono::{DateTime, Utc};

use crate::ids::UserId;

/// Per-channel notification opt-in flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotifyFlags {
    pub email: bool,
    pub chat: bool,
    pub push: bool,
}

/// A Plex account (token owner or friend) whose watchlist is observed.
///
/// Invariants: at most one user has `is_primary_token = true`; the "System"
/// user ([`UserId::SYSTEM`]) is never deleted; created on token activation or
/// when a friend first appears, deleted only when the token owner removes
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub plex_uuid: Option<String>,
    pub alias: Option<String>,
    pub email: Option<String>,
    pub chat_id: Option<String>,
    pub notify_flags: NotifyFlags,
    pub can_sync: bool,
    pub is_primary_token: bool,
    pub requires_approval: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when this is the reserved, undeletable System user (id 0).
    pub fn is_system(&self) -> bool {
        self.id.is_system()
    }
}
