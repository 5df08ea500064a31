//! Notification dispatch (spec §4.H): per-`(user, event)` de-dup, channel
//! fan-out gated by `notify_flags`, and sync-detection suppression.
//!
//! Grounded on `ferrex-core::scan::orchestration::events::JobEventPublisher`
//! (an `#[async_trait]` publish trait over a typed payload), generalized
//! here to a `NotificationChannel::send` per outbound medium, and on the
//! check-then-insert-in-one-transaction shape of `ferrex-core::database::ports`
//! repositories for the de-dup lookup.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use relaybridge_contracts::persistence::{NotificationRepository, RepositoryError};
use relaybridge_model::{NotificationDedupeKey, NotificationRecord, NotificationStatus, NotifyFlags, SentToChannels, User};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

/// Which notify-flag gates a channel, and which [`SentToChannels`] bit it
/// sets on success (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Chat,
    Email,
    Webhook,
    Push,
}

impl ChannelKind {
    fn enabled_in(self, flags: NotifyFlags) -> bool {
        match self {
            ChannelKind::Chat => flags.chat,
            ChannelKind::Email => flags.email,
            ChannelKind::Webhook => true,
            ChannelKind::Push => flags.push,
        }
    }

    fn mark(self, sent_to: &mut SentToChannels) {
        match self {
            ChannelKind::Chat => sent_to.chat = true,
            ChannelKind::Email => sent_to.email = true,
            ChannelKind::Webhook => sent_to.webhook = true,
            ChannelKind::Push => sent_to.push = true,
        }
    }
}

/// One outbound medium a notification can be delivered through.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, user: &User, record: &NotificationRecord) -> std::result::Result<(), String>;
}

/// Computes the de-dup lookup hash for `key`, stored against the existing
/// record by [`NotificationRepository::was_sent`] (spec §3).
pub fn hash_dedupe_key(key: &NotificationDedupeKey) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Dispatches one notification (spec §4.H): suppresses an already-sent
/// de-dup key or a detected sync-duplicate, otherwise fans out to every
/// channel the user's `notify_flags` permit and records the per-channel
/// outcome atomically with the de-dup insert.
pub async fn dispatch(
    repo: &dyn NotificationRepository,
    channels: &[Box<dyn NotificationChannel>],
    user: &User,
    mut record: NotificationRecord,
    synced_duplicate: bool,
) -> Result<NotificationRecord> {
    record.user_id = Some(user.id);
    let key = record.dedupe_key(user.id);
    let hash = hash_dedupe_key(&key);

    if repo.was_sent(hash).await? {
        record.notification_status = NotificationStatus::Suppressed;
        repo.record(&record).await?;
        return Ok(record);
    }

    if synced_duplicate {
        // Still recorded (so de-dup and history stay complete), but no
        // channel receives it (spec §4.H "still recording the event").
        record.notification_status = NotificationStatus::Suppressed;
        repo.record(&record).await?;
        return Ok(record);
    }

    let mut sent_to = SentToChannels::default();
    let mut any_sent = false;
    let mut any_failed = false;
    for channel in channels {
        let kind = channel.kind();
        if !kind.enabled_in(user.notify_flags) {
            continue;
        }
        match channel.send(user, &record).await {
            Ok(()) => {
                kind.mark(&mut sent_to);
                any_sent = true;
            }
            Err(err) => {
                any_failed = true;
                warn!(channel = ?kind, user_id = %user.id, error = %err, "notification channel send failed");
            }
        }
    }

    record.sent_to = sent_to;
    record.notification_status = if any_sent {
        NotificationStatus::Sent
    } else if any_failed {
        NotificationStatus::Failed
    } else {
        NotificationStatus::Suppressed
    };
    repo.record(&record).await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;
    use relaybridge_model::{NotificationId, NotificationType, UserId};

    fn sample_user(flags: NotifyFlags) -> User {
        User {
            id: UserId::new(),
            name: "alice".into(),
            plex_uuid: None,
            alias: None,
            email: None,
            chat_id: None,
            notify_flags: flags,
            can_sync: true,
            is_primary_token: true,
            requires_approval: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn sample_record() -> NotificationRecord {
        NotificationRecord {
            id: NotificationId::new(),
            watchlist_item_id: None,
            user_id: None,
            notification_type: NotificationType::Movie,
            title: "Example".into(),
            season: None,
            episode: None,
            sent_to: SentToChannels::default(),
            notification_status: NotificationStatus::Sent,
            created_at: chrono::Utc::now(),
        }
    }

    struct FakeChannel {
        kind: ChannelKind,
        fails: bool,
    }

    #[async_trait]
    impl NotificationChannel for FakeChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }
        async fn send(&self, _user: &User, _record: &NotificationRecord) -> std::result::Result<(), String> {
            if self.fails {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn disabled_channel_never_receives_the_notification() {
        let store = InMemoryStore::new();
        let user = sample_user(NotifyFlags { email: false, chat: true, push: false });
        let channels: Vec<Box<dyn NotificationChannel>> =
            vec![Box::new(FakeChannel { kind: ChannelKind::Email, fails: false })];
        let record = dispatch(&store, &channels, &user, sample_record(), false).await.unwrap();
        assert!(!record.sent_to.email);
        assert_eq!(record.notification_status, NotificationStatus::Suppressed);
    }

    #[tokio::test]
    async fn second_dispatch_of_same_key_is_suppressed() {
        let store = InMemoryStore::new();
        let user = sample_user(NotifyFlags { email: true, chat: false, push: false });
        let channels: Vec<Box<dyn NotificationChannel>> =
            vec![Box::new(FakeChannel { kind: ChannelKind::Email, fails: false })];
        let first = dispatch(&store, &channels, &user, sample_record(), false).await.unwrap();
        assert_eq!(first.notification_status, NotificationStatus::Sent);
        let second = dispatch(&store, &channels, &user, sample_record(), false).await.unwrap();
        assert_eq!(second.notification_status, NotificationStatus::Suppressed);
    }

    #[tokio::test]
    async fn sync_duplicate_is_suppressed_but_still_recorded() {
        let store = InMemoryStore::new();
        let user = sample_user(NotifyFlags { email: true, chat: false, push: false });
        let channels: Vec<Box<dyn NotificationChannel>> =
            vec![Box::new(FakeChannel { kind: ChannelKind::Email, fails: false })];
        let record = dispatch(&store, &channels, &user, sample_record(), true).await.unwrap();
        assert_eq!(record.notification_status, NotificationStatus::Suppressed);
        assert!(!record.sent_to.email);
    }

    #[tokio::test]
    async fn failed_channel_yields_failed_status() {
        let store = InMemoryStore::new();
        let user = sample_user(NotifyFlags { email: true, chat: false, push: false });
        let channels: Vec<Box<dyn NotificationChannel>> =
            vec![Box::new(FakeChannel { kind: ChannelKind::Email, fails: true })];
        let record = dispatch(&store, &channels, &user, sample_record(), false).await.unwrap();
        assert_eq!(record.notification_status, NotificationStatus::Failed);
    }
}
