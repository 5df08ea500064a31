//! Core data model definitions shared across the relaybridge crates.
#![allow(missing_docs)]

pub mod approval;
pub mod error;
pub mod guid;
pub mod ids;
pub mod instance;
pub mod label;
pub mod notification;
pub mod prelude;
pub mod quota;
pub mod rolling_monitoring;
pub mod routing;
pub mod scheduled_job;
pub mod user;
pub mod watchlist;

pub use approval::{ApprovalRequest, ApprovalStatus, ApprovalTerminalError};
pub use error::{ModelError, Result as ModelResult};
pub use guid::{guid_sets_intersect, Guid};
pub use ids::{
    ApprovalId, InstanceId, NotificationId, RuleId, ScheduledJobId, UserId,
    WatchlistItemId,
};
pub use instance::{
    ApiKey, DownstreamInstance, InstanceDefaults, MinimumAvailability,
    SeasonMonitoring, SeriesType,
};
pub use label::{LabelTracking, RemovedUserPolicy};
pub use notification::{
    NotificationDedupeKey, NotificationRecord, NotificationStatus,
    NotificationType, SentToChannels,
};
pub use quota::{MonthEndPolicy, QuotaRecord, QuotaStatus, QuotaWindow, UsageEvent};
pub use rolling_monitoring::{RollingMonitoringKind, RollingMonitoringState};
pub use routing::{
    ApprovalRequirement, ApprovalTrigger, BoolOp, Condition, Criteria,
    Operator, RouterRule, RoutingBundle, RoutingDecision, RoutingSpec,
    DEFAULT_ROUTING_PRIORITY,
};
pub use scheduled_job::{JobTrigger, LastRun, NextRun, RunStatus, ScheduledJob};
pub use user::{NotifyFlags, User};
pub use watchlist::{
    ContentType, DownstreamKind, MovieAvailability, SeriesStatus,
    StatusDowngradeError, WatchlistItem, WatchlistStatus,
    WatchlistStatusHistoryEntry,
};
