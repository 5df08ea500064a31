//! Convenience re-export surface for downstream consumers.
//! Prefer importing from this module instead of individual tree nodes.

pub use super::approval::{ApprovalRequest, ApprovalStatus, ApprovalTerminalError};
pub use super::error::{ModelError, Result as ModelResult};
pub use super::guid::{guid_sets_intersect, Guid};
pub use super::ids::{
    ApprovalId, InstanceId, NotificationId, RuleId, ScheduledJobId, UserId,
    WatchlistItemId,
};
pub use super::instance::{
    ApiKey, DownstreamInstance, InstanceDefaults, MinimumAvailability,
    SeasonMonitoring, SeriesType,
};
pub use super::label::{LabelTracking, RemovedUserPolicy};
pub use super::notification::{
    NotificationDedupeKey, NotificationRecord, NotificationStatus,
    NotificationType, SentToChannels,
};
pub use super::quota::{MonthEndPolicy, QuotaRecord, QuotaStatus, QuotaWindow, UsageEvent};
pub use super::rolling_monitoring::{RollingMonitoringKind, RollingMonitoringState};
pub use super::routing::{
    ApprovalRequirement, ApprovalTrigger, BoolOp, Condition, Criteria,
    Operator, RouterRule, RoutingBundle, RoutingDecision, RoutingSpec,
    DEFAULT_ROUTING_PRIORITY,
};
pub use super::scheduled_job::{JobTrigger, LastRun, NextRun, RunStatus, ScheduledJob};
pub use super::user::{NotifyFlags, User};
pub use super::watchlist::{
    ContentType, DownstreamKind, MovieAvailability, SeriesStatus,
    StatusDowngradeError, WatchlistItem, WatchlistStatus,
    WatchlistStatusHistoryEntry,
};
