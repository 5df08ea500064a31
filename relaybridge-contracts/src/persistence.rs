//! Persistence facade contracts (spec §4.K, §6): one trait per bounded
//! context, grounded on `ferrex-core::database::ports::*`'s one-trait-per-
//! concern layout. Concrete storage engines (Postgres, SQLite, ...) are
//! deliberately out of scope here — callers depend on these traits, never on
//! a storage engine directly.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use relaybridge_model::{
    ApprovalId, ApprovalRequest, DownstreamInstance, InstanceId, LabelTracking, NotificationRecord,
    QuotaRecord, RouterRule, RuleId, ScheduledJob, ScheduledJobId, UsageEvent, UserId, User,
    WatchlistItem, WatchlistItemId,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found")]
    NotFound,

    #[error("a row already exists for this key")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    async fn get(&self, id: WatchlistItemId) -> Result<WatchlistItem>;

    async fn find_by_user_and_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<WatchlistItem>>;

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<WatchlistItem>>;

    async fn upsert(&self, item: &WatchlistItem) -> Result<()>;

    /// Bulk-updates main rows and their instance-association junction rows in
    /// one call (spec §6: "bulk-update for watchlist items (main + junction)").
    async fn bulk_update(&self, items: &[WatchlistItem]) -> Result<()>;

    async fn delete(&self, id: WatchlistItemId) -> Result<()>;

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn upsert_user(&self, user: &User) -> Result<()>;

    async fn delete_user(&self, id: UserId) -> Result<()>;
}

#[async_trait]
pub trait RouterRuleRepository: Send + Sync {
    async fn get(&self, id: RuleId) -> Result<RouterRule>;

    async fn list_enabled(&self) -> Result<Vec<RouterRule>>;

    async fn upsert(&self, rule: &RouterRule) -> Result<()>;

    async fn delete(&self, id: RuleId) -> Result<()>;

    async fn get_instance(&self, id: InstanceId) -> Result<DownstreamInstance>;

    async fn list_instances(&self) -> Result<Vec<DownstreamInstance>>;

    async fn upsert_instance(&self, instance: &DownstreamInstance) -> Result<()>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn get(&self, id: ApprovalId) -> Result<ApprovalRequest>;

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>>;

    /// Finds an expired `Pending`-turned-`Expired` request for the same
    /// `(user_id, content_key)` so a new trigger can reuse its row instead of
    /// inserting a duplicate (spec §6: "expired-duplicate reuse").
    async fn find_reusable_expired(
        &self,
        user_id: UserId,
        content_key: &str,
    ) -> Result<Option<ApprovalRequest>>;

    /// Atomically creates a new pending request, or reuses an existing
    /// expired row for the same key (spec §6: "atomic create/update with
    /// expired-duplicate reuse").
    async fn create_or_reuse(&self, request: ApprovalRequest) -> Result<ApprovalRequest>;

    async fn update(&self, request: &ApprovalRequest) -> Result<()>;
}

#[async_trait]
pub trait QuotaRepository: Send + Sync {
    async fn get_quota(&self, user_id: UserId) -> Result<Vec<QuotaRecord>>;

    async fn upsert_quota(&self, quota: &QuotaRecord) -> Result<()>;

    async fn record_usage(&self, event: &UsageEvent) -> Result<()>;

    async fn usage_since(
        &self,
        user_id: UserId,
        content_type: relaybridge_model::ContentType,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<u32>;

    /// Deletes usage events older than `before`, run by the scheduled
    /// maintenance job (spec §4.E "maintenance").
    async fn prune_usage_before(&self, before: chrono::DateTime<chrono::Utc>) -> Result<u64>;
}

#[async_trait]
pub trait SchedulerRepository: Send + Sync {
    async fn get(&self, id: ScheduledJobId) -> Result<ScheduledJob>;

    async fn list(&self) -> Result<Vec<ScheduledJob>>;

    async fn upsert(&self, job: &ScheduledJob) -> Result<()>;
}

#[async_trait]
pub trait LabelTrackingRepository: Send + Sync {
    async fn list_for_watchlist_item(
        &self,
        watchlist_id: WatchlistItemId,
    ) -> Result<Vec<LabelTracking>>;

    async fn list_for_label(&self, label: &str) -> Result<Vec<LabelTracking>>;

    async fn record(&self, tracking: &LabelTracking) -> Result<()>;

    async fn remove(&self, watchlist_id: WatchlistItemId, label: &str) -> Result<()>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn was_sent(&self, dedupe_key_hash: u64) -> Result<bool>;

    async fn record(&self, notification: &NotificationRecord) -> Result<()>;
}

/// Opaque row identifier used where a repository needs to reference a row
/// that has no dedicated newtype of its own (e.g. a junction row).
pub type RowId = Uuid;
