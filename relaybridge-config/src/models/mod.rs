pub mod label_sync;
pub mod rate_limit;
pub mod sources;

use serde::{Deserialize, Serialize};
use url::Url;

use label_sync::LabelSyncConfig;
use rate_limit::{RateLimitSource, RateLimiterConfig};

use crate::error::{ConfigLoadError, Result};

/// TMDB metadata-enrichment settings (spec §4.C, §6: "TMDB region").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmdbConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Quota maintenance job trigger (spec §4.E, §6: "quota maintenance
/// schedule"), a 6-field `sec min hr dom mon dow` cron expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaMaintenanceConfig {
    pub cron_expression: String,
}

impl Default for QuotaMaintenanceConfig {
    fn default() -> Self {
        Self { cron_expression: "0 0 3 * * *".into() }
    }
}

impl QuotaMaintenanceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cron_expression.trim().is_empty() {
            return Err(ConfigLoadError::EmptyMaintenanceSchedule);
        }
        Ok(())
    }
}

/// Where the effective config for a run was assembled from, for
/// diagnostics (mirrors `ferrex-config::models::ConfigMetadata`).
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<std::path::PathBuf>,
    pub env_overrides_applied: bool,
    pub rate_limit_source: RateLimitSource,
}

/// The versioned, fully-resolved runtime configuration (spec §6).
///
/// Assembled by [`crate::loader::ConfigLoader`] by merging defaults, an
/// optional file, and environment overrides, in that order. Mutations go
/// through a [`relaybridge_contracts::config::ConfigStore`] implementation
/// that commits transactionally and refreshes this snapshot only on
/// success.
#[derive(Debug, Clone)]
pub struct Config {
    pub version: u32,
    /// The Plex primary account token. Never logged; redacted in `Debug`
    /// output of the holding type, not this plain string field — callers
    /// that embed this in a user-facing struct should wrap it themselves.
    pub primary_token: String,
    pub rss_urls: Vec<Url>,
    pub rate_limiter: RateLimiterConfig,
    pub tmdb: TmdbConfig,
    pub quota_maintenance: QuotaMaintenanceConfig,
    pub label_sync: LabelSyncConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Cross-field validation beyond what a single sub-struct checks on its
    /// own.
    pub fn validate(&self) -> Result<()> {
        if self.primary_token.trim().is_empty() {
            return Err(ConfigLoadError::EmptyPrimaryToken);
        }
        self.label_sync.validate()?;
        self.quota_maintenance.validate()?;
        Ok(())
    }
}
