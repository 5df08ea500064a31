//! An in-memory reference implementation of every
//! `relaybridge_contracts::persistence` trait (spec §4.K), grounded on
//! `ferrex-core::database::ports`'s in-memory test doubles: one `dashmap`
//! per row type, cloning rows in and out so callers never observe a lock
//! held across an `.await`.
//!
//! This backs this crate's own integration tests and doubles as a usage
//! example for whatever storage engine a caller wires in for real.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use relaybridge_contracts::persistence::{
    ApprovalRepository, LabelTrackingRepository, NotificationRepository, QuotaRepository,
    RepositoryError, Result, RouterRuleRepository, SchedulerRepository, WatchlistRepository,
};
use relaybridge_model::{
    ApprovalId, ApprovalRequest, ApprovalStatus, ContentType, DownstreamInstance, InstanceId,
    LabelTracking, NotificationRecord, QuotaRecord, RouterRule, RuleId, ScheduledJob,
    ScheduledJobId, UsageEvent, User, UserId, WatchlistItem, WatchlistItemId,
};

/// An in-process store backing all seven persistence traits at once.
#[derive(Default)]
pub struct InMemoryStore {
    watchlist_items: DashMap<WatchlistItemId, WatchlistItem>,
    users: DashMap<UserId, User>,
    rules: DashMap<RuleId, RouterRule>,
    instances: DashMap<InstanceId, DownstreamInstance>,
    approvals: DashMap<ApprovalId, ApprovalRequest>,
    quotas: DashMap<UserId, Vec<QuotaRecord>>,
    usage: DashMap<UserId, Vec<UsageEvent>>,
    jobs: DashMap<ScheduledJobId, ScheduledJob>,
    labels: DashMap<(WatchlistItemId, String), LabelTracking>,
    notifications_seen: DashMap<u64, ()>,
    notifications: DashMap<relaybridge_model::NotificationId, NotificationRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchlistRepository for InMemoryStore {
    async fn get(&self, id: WatchlistItemId) -> Result<WatchlistItem> {
        self.watchlist_items.get(&id).map(|r| r.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn find_by_user_and_key(&self, user_id: UserId, key: &str) -> Result<Option<WatchlistItem>> {
        Ok(self
            .watchlist_items
            .iter()
            .find(|r| r.user_id == user_id && r.key == key)
            .map(|r| r.clone()))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<WatchlistItem>> {
        Ok(self.watchlist_items.iter().filter(|r| r.user_id == user_id).map(|r| r.clone()).collect())
    }

    async fn upsert(&self, item: &WatchlistItem) -> Result<()> {
        self.watchlist_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn bulk_update(&self, items: &[WatchlistItem]) -> Result<()> {
        for item in items {
            self.watchlist_items.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: WatchlistItemId) -> Result<()> {
        self.watchlist_items.remove(&id);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.iter().map(|r| r.clone()).collect())
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RouterRuleRepository for InMemoryStore {
    async fn get(&self, id: RuleId) -> Result<RouterRule> {
        self.rules.get(&id).map(|r| r.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn list_enabled(&self) -> Result<Vec<RouterRule>> {
        Ok(self.rules.iter().filter(|r| r.enabled).map(|r| r.clone()).collect())
    }

    async fn upsert(&self, rule: &RouterRule) -> Result<()> {
        self.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn delete(&self, id: RuleId) -> Result<()> {
        self.rules.remove(&id);
        Ok(())
    }

    async fn get_instance(&self, id: InstanceId) -> Result<DownstreamInstance> {
        self.instances.get(&id).map(|r| r.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn list_instances(&self) -> Result<Vec<DownstreamInstance>> {
        Ok(self.instances.iter().map(|r| r.clone()).collect())
    }

    async fn upsert_instance(&self, instance: &DownstreamInstance) -> Result<()> {
        self.instances.insert(instance.id, instance.clone());
        Ok(())
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryStore {
    async fn get(&self, id: ApprovalId) -> Result<ApprovalRequest> {
        self.approvals.get(&id).map(|r| r.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self
            .approvals
            .iter()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .map(|r| r.clone())
            .collect())
    }

    async fn find_reusable_expired(&self, user_id: UserId, content_key: &str) -> Result<Option<ApprovalRequest>> {
        Ok(self
            .approvals
            .iter()
            .find(|r| {
                r.user_id == user_id && r.content_key == content_key && r.status == ApprovalStatus::Expired
            })
            .map(|r| r.clone()))
    }

    async fn create_or_reuse(&self, request: ApprovalRequest) -> Result<ApprovalRequest> {
        if let Some(mut reusable) = self.find_reusable_expired(request.user_id, &request.content_key).await? {
            reusable.status = ApprovalStatus::Pending;
            reusable.proposed_router_decision = request.proposed_router_decision;
            reusable.triggered_by = request.triggered_by;
            reusable.approval_reason = request.approval_reason;
            reusable.approved_by = None;
            reusable.approval_notes = None;
            reusable.expires_at = request.expires_at;
            reusable.updated_at = Utc::now();
            self.approvals.insert(reusable.id, reusable.clone());
            return Ok(reusable);
        }
        self.approvals.insert(request.id, request.clone());
        Ok(request)
    }

    async fn update(&self, request: &ApprovalRequest) -> Result<()> {
        self.approvals.insert(request.id, request.clone());
        Ok(())
    }
}

#[async_trait]
impl QuotaRepository for InMemoryStore {
    async fn get_quota(&self, user_id: UserId) -> Result<Vec<QuotaRecord>> {
        Ok(self.quotas.get(&user_id).map(|r| r.clone()).unwrap_or_default())
    }

    async fn upsert_quota(&self, quota: &QuotaRecord) -> Result<()> {
        let mut records = self.quotas.entry(quota.user_id).or_default();
        if let Some(existing) = records.iter_mut().find(|r| r.content_type == quota.content_type) {
            *existing = quota.clone();
        } else {
            records.push(quota.clone());
        }
        Ok(())
    }

    async fn record_usage(&self, event: &UsageEvent) -> Result<()> {
        self.usage.entry(event.user_id).or_default().push(event.clone());
        Ok(())
    }

    async fn usage_since(&self, user_id: UserId, content_type: ContentType, since: DateTime<Utc>) -> Result<u32> {
        Ok(self
            .usage
            .get(&user_id)
            .map(|events| events.iter().filter(|e| e.content_type == content_type && e.ts >= since).count() as u32)
            .unwrap_or(0))
    }

    async fn prune_usage_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut pruned = 0u64;
        for mut events in self.usage.iter_mut() {
            let original_len = events.len();
            events.retain(|e| e.ts >= before);
            pruned += (original_len - events.len()) as u64;
        }
        Ok(pruned)
    }
}

#[async_trait]
impl SchedulerRepository for InMemoryStore {
    async fn get(&self, id: ScheduledJobId) -> Result<ScheduledJob> {
        self.jobs.get(&id).map(|r| r.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>> {
        Ok(self.jobs.iter().map(|r| r.clone()).collect())
    }

    async fn upsert(&self, job: &ScheduledJob) -> Result<()> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }
}

#[async_trait]
impl LabelTrackingRepository for InMemoryStore {
    async fn list_for_watchlist_item(&self, watchlist_id: WatchlistItemId) -> Result<Vec<LabelTracking>> {
        Ok(self.labels.iter().filter(|r| r.key().0 == watchlist_id).map(|r| r.value().clone()).collect())
    }

    async fn list_for_label(&self, label: &str) -> Result<Vec<LabelTracking>> {
        Ok(self.labels.iter().filter(|r| r.key().1 == label).map(|r| r.value().clone()).collect())
    }

    async fn record(&self, tracking: &LabelTracking) -> Result<()> {
        self.labels.insert((tracking.watchlist_id, tracking.label_applied.clone()), tracking.clone());
        Ok(())
    }

    async fn remove(&self, watchlist_id: WatchlistItemId, label: &str) -> Result<()> {
        self.labels.remove(&(watchlist_id, label.to_string()));
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn was_sent(&self, dedupe_key_hash: u64) -> Result<bool> {
        Ok(self.notifications_seen.contains_key(&dedupe_key_hash))
    }

    async fn record(&self, notification: &NotificationRecord) -> Result<()> {
        if let Some(user_id) = notification.user_id {
            let hash = crate::notify::hash_dedupe_key(&notification.dedupe_key(user_id));
            self.notifications_seen.insert(hash, ());
        }
        self.notifications.insert(notification.id, notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybridge_model::{ContentType, WatchlistStatus};

    fn sample_item(user_id: UserId, key: &str) -> WatchlistItem {
        WatchlistItem {
            id: WatchlistItemId::new(),
            user_id,
            key: key.to_string(),
            title: "Title".into(),
            content_type: ContentType::Movie,
            thumb: None,
            added: None,
            guids: Vec::new(),
            genres: Vec::new(),
            status: WatchlistStatus::Pending,
            series_status: None,
            movie_status: None,
            sonarr_instance_id: None,
            radarr_instance_id: None,
            last_notified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_find_by_user_and_key_round_trips() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let item = sample_item(user_id, "42");
        WatchlistRepository::upsert(&store, &item).await.unwrap();
        let found = store.find_by_user_and_key(user_id, "42").await.unwrap().unwrap();
        assert_eq!(found.id, item.id);
    }

    #[tokio::test]
    async fn delete_removes_item_from_user_listing() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let item = sample_item(user_id, "7");
        WatchlistRepository::upsert(&store, &item).await.unwrap();
        WatchlistRepository::delete(&store, item.id).await.unwrap();
        assert!(store.list_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn usage_since_only_counts_events_in_window() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let old = UsageEvent { user_id, content_type: ContentType::Movie, ts: Utc::now() - chrono::Duration::days(2) };
        let recent = UsageEvent { user_id, content_type: ContentType::Movie, ts: Utc::now() };
        store.record_usage(&old).await.unwrap();
        store.record_usage(&recent).await.unwrap();
        let since = Utc::now() - chrono::Duration::hours(1);
        let count = store.usage_since(user_id, ContentType::Movie, since).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn label_tracking_records_and_removes() {
        let store = InMemoryStore::new();
        let item_id = WatchlistItemId::new();
        let tracking = LabelTracking { watchlist_id: item_id, plex_rating_key: "rk1".into(), label_applied: "relaybridge".into() };
        LabelTrackingRepository::record(&store, &tracking).await.unwrap();
        assert_eq!(store.list_for_watchlist_item(item_id).await.unwrap().len(), 1);
        store.remove(item_id, "relaybridge").await.unwrap();
        assert!(store.list_for_watchlist_item(item_id).await.unwrap().is_empty());
    }
}
