//! The progress bus protocol (spec §4.J, §6): a typed pub/sub stream UI and
//! diagnostics consumers subscribe to, grounded on
//! `ferrex-core::scan::orchestration::events` (`EventMeta`, typed payload
//! enum, at-most-once/non-blocking delivery).

use chrono::{DateTime, Utc};

use relaybridge_model::UserId;

/// The progress event categories named in spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEventKind {
    SelfWatchlist,
    OthersWatchlist,
    RssFeed,
    System,
    Sync,
    SonarrTagging,
    RadarrTagging,
    SonarrTagRemoval,
    RadarrTagRemoval,
    Approval,
}

/// Envelope metadata common to every progress event, mirroring the
/// teacher's `EventMeta`.
#[derive(Debug, Clone)]
pub struct EventMeta {
    pub kind: ProgressEventKind,
    pub user_id: Option<UserId>,
    pub emitted_at: DateTime<Utc>,
}

/// A single progress update. `progress` is clamped to `[0, 100]` by
/// [`ProgressEvent::new`].
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub meta: EventMeta,
    pub progress: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(kind: ProgressEventKind, user_id: Option<UserId>, progress: u8, message: impl Into<String>) -> Self {
        Self {
            meta: EventMeta { kind, user_id, emitted_at: Utc::now() },
            progress: progress.min(100),
            message: message.into(),
        }
    }
}

/// Publishes progress events to whatever subscribers are listening.
///
/// Delivery is at-most-once and non-blocking: a slow subscriber has events
/// dropped rather than applying backpressure to the publisher, the same
/// tradeoff the teacher's event bus makes.
pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, event: ProgressEvent);

    /// True if publishing would reach at least one subscriber, letting
    /// callers skip constructing an event nobody will see.
    fn has_active_subscribers(&self) -> bool {
        true
    }
}
