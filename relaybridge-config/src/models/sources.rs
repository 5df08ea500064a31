use serde::{Deserialize, Serialize};

use relaybridge_model::RemovedUserPolicy;

use super::rate_limit::RateLimiterConfig;

/// Raw configuration as loaded from a file or environment layer: every
/// field optional so later layers only override what they actually set
/// (mirrors `ferrex-config::models::sources::FileConfig`).
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RawConfig {
    pub version: Option<u32>,
    pub primary_token: Option<String>,
    #[serde(default)]
    pub rss_urls: Vec<String>,
    pub rate_limiter: Option<RateLimiterConfig>,
    pub tmdb_region: Option<String>,
    pub tmdb_language: Option<String>,
    pub quota_maintenance_cron: Option<String>,
    pub label_sync: Option<RawLabelSync>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLabelSync {
    pub prefix: Option<String>,
    pub removed_user_policy: Option<RemovedUserPolicy>,
    pub concurrency: Option<u8>,
}
