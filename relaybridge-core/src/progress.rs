//! The in-process progress bus (spec §4.J), grounded directly on
//! `ferrex-core::scan::orchestration::events` (`EventMeta`, a typed payload
//! enum, and the `has_active_subscribers`-style guard publishers check
//! before constructing an event), reusing the teacher's at-most-once /
//! non-blocking delivery tradeoff via `tokio::sync::broadcast` — a slow
//! subscriber has events dropped rather than applying backpressure to the
//! publisher.

use tokio::sync::broadcast;

use relaybridge_contracts::progress_events::{ProgressEvent, ProgressEventKind, ProgressPublisher};

/// A `broadcast`-backed [`ProgressPublisher`]. Cloning shares the same
/// underlying channel; every clone publishes to every subscriber.
#[derive(Clone)]
pub struct BroadcastProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgressBus {
    /// `capacity` bounds how many events a lagging subscriber can fall
    /// behind before older ones are dropped for it (spec §4.J "slow
    /// subscribers drop events").
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription { receiver: self.sender.subscribe(), filter: None }
    }
}

impl Default for BroadcastProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressPublisher for BroadcastProgressBus {
    fn publish(&self, event: ProgressEvent) {
        // `send` only errors when there are no receivers; that is exactly
        // the case `has_active_subscribers` exists to let callers skip.
        let _ = self.sender.send(event);
    }

    fn has_active_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// A live subscription, optionally filtered to a single
/// [`ProgressEventKind`] (spec §4.J "Subscribers filter by type").
pub struct ProgressSubscription {
    receiver: broadcast::Receiver<ProgressEvent>,
    filter: Option<ProgressEventKind>,
}

impl ProgressSubscription {
    pub fn filter_kind(mut self, kind: ProgressEventKind) -> Self {
        self.filter = Some(kind);
        self
    }

    /// Awaits the next event matching this subscription's filter, skipping
    /// non-matching events and gap-closing on a `Lagged` error (the dropped
    /// events are the ones the subscriber fell behind on, by design).
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.is_none_or(|kind| kind == event.meta.kind) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subscribers_reports_inactive() {
        let bus = BroadcastProgressBus::new(8);
        assert!(!bus.has_active_subscribers());
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = BroadcastProgressBus::new(8);
        let mut sub = bus.subscribe();
        assert!(bus.has_active_subscribers());
        bus.publish(ProgressEvent::new(ProgressEventKind::System, None, 50, "halfway"));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.progress, 50);
    }

    #[tokio::test]
    async fn filter_skips_other_kinds() {
        let bus = BroadcastProgressBus::new(8);
        let mut sub = bus.subscribe().filter_kind(ProgressEventKind::Approval);
        bus.publish(ProgressEvent::new(ProgressEventKind::System, None, 10, "not approval"));
        bus.publish(ProgressEvent::new(ProgressEventKind::Approval, None, 20, "approval"));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.meta.kind, ProgressEventKind::Approval);
    }
}
