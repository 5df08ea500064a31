use serde::{Deserialize, Serialize};

/// Token-bucket parameters for one outbound endpoint family (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitSpec {
    fn default() -> Self {
        Self { requests_per_second: 2.0, burst: 5 }
    }
}

/// Per-family outbound rate-limit parameters, with a fallback applied to any
/// family not listed explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub default: RateLimitSpec,
    #[serde(default)]
    pub overrides: std::collections::BTreeMap<String, RateLimitSpec>,
}

impl RateLimiterConfig {
    pub fn for_family(&self, family: &str) -> RateLimitSpec {
        self.overrides.get(family).copied().unwrap_or(self.default)
    }
}

/// Where the effective rate-limit configuration for a run came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateLimitSource {
    #[default]
    Default,
    File,
    Env,
}
