//! Trait surfaces that describe interactions across the relaybridge
//! boundary: downstream managers, watchlist sources, the scheduler API, the
//! persistence facade, the progress bus, and config mutation.

pub mod config;
pub mod downstream_manager;
pub mod persistence;
pub mod progress_events;
pub mod scheduler_api;
pub mod watchlist_source;

/// Frequently used trait combinators for orchestration crates.
pub mod prelude {
    pub use super::config::ConfigStore;
    pub use super::downstream_manager::DownstreamManager;
    pub use super::persistence::{
        ApprovalRepository, LabelTrackingRepository, NotificationRepository, QuotaRepository,
        RouterRuleRepository, SchedulerRepository, WatchlistRepository,
    };
    pub use super::progress_events::ProgressPublisher;
    pub use super::scheduler_api::SchedulerApi;
    pub use super::watchlist_source::WatchlistSource;
}
