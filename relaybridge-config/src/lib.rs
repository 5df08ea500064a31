//! Layered configuration loading for relaybridge: defaults, an optional
//! file, and environment overrides merge into one versioned [`Config`].

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigLoadError, Result};
pub use loader::{load_from_env, ConfigLoader};
pub use models::label_sync::LabelSyncConfig;
pub use models::rate_limit::{RateLimitSource, RateLimiterConfig};
pub use models::{Config, ConfigMetadata, QuotaMaintenanceConfig, TmdbConfig};
