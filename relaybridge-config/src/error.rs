use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration source: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid RSS url {raw:?}: {source}")]
    InvalidRssUrl { raw: String, source: url::ParseError },

    #[error("label sync concurrency must be between 1 and 20, got {0}")]
    InvalidLabelSyncConcurrency(u8),

    #[error("quota maintenance cron expression must not be empty")]
    EmptyMaintenanceSchedule,

    #[error("primary token must not be empty")]
    EmptyPrimaryToken,
}

pub type Result<T> = std::result::Result<T, ConfigLoadError>;
