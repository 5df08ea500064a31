//! Layered config loading: defaults → file → environment, mirroring
//! `ferrex-config::loader::ConfigLoader`.

use std::path::PathBuf;

use url::Url;

use crate::error::{ConfigLoadError, Result};
use crate::models::label_sync::LabelSyncConfig;
use crate::models::rate_limit::RateLimitSource;
use crate::models::sources::RawConfig;
use crate::models::{Config, ConfigMetadata, QuotaMaintenanceConfig, TmdbConfig};

/// Assembles a [`Config`] from defaults, an optional file, and environment
/// variables prefixed `RELAYBRIDGE__`, in that precedence order.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<Config> {
        let mut builder = config::Config::builder();
        if let Some(path) = &self.file_path {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("RELAYBRIDGE")
                .separator("__")
                .try_parsing(true),
        );
        let raw: RawConfig = builder.build()?.try_deserialize()?;

        let env_overrides_applied = std::env::vars().any(|(k, _)| k.starts_with("RELAYBRIDGE__"));
        let rate_limit_source = match (&raw.rate_limiter, env_overrides_applied) {
            (Some(_), true) => RateLimitSource::Env,
            (Some(_), false) => RateLimitSource::File,
            (None, _) => RateLimitSource::Default,
        };

        let rss_urls = raw
            .rss_urls
            .iter()
            .map(|raw_url| {
                Url::parse(raw_url).map_err(|source| ConfigLoadError::InvalidRssUrl {
                    raw: raw_url.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let label_sync = raw.label_sync.map(|raw_label_sync| {
            let defaults = LabelSyncConfig::default();
            LabelSyncConfig {
                prefix: raw_label_sync.prefix.unwrap_or(defaults.prefix),
                removed_user_policy: raw_label_sync
                    .removed_user_policy
                    .unwrap_or(defaults.removed_user_policy),
                concurrency: raw_label_sync.concurrency.unwrap_or(defaults.concurrency),
            }
        }).unwrap_or_default();

        let config = Config {
            version: raw.version.unwrap_or(1),
            primary_token: raw.primary_token.unwrap_or_default(),
            rss_urls,
            rate_limiter: raw.rate_limiter.unwrap_or_default(),
            tmdb: TmdbConfig { region: raw.tmdb_region, language: raw.tmdb_language },
            quota_maintenance: QuotaMaintenanceConfig {
                cron_expression: raw
                    .quota_maintenance_cron
                    .unwrap_or_else(|| QuotaMaintenanceConfig::default().cron_expression),
            },
            label_sync,
            metadata: ConfigMetadata {
                config_path: self.file_path.clone(),
                env_overrides_applied,
                rate_limit_source,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Convenience for loading a config with no file layer, only defaults and
/// environment overrides.
pub fn load_from_env() -> Result<Config> {
    ConfigLoader::new().load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn write_temp_json(contents: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join(format!("relaybridge-config-test-{}-{n}.json", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_defaults_when_nothing_overridden() {
        let missing = std::env::temp_dir().join("relaybridge-config-test-missing.json");
        let err = ConfigLoader::new().with_file(missing).load().unwrap_err();
        assert!(matches!(err, ConfigLoadError::EmptyPrimaryToken));
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let path = write_temp_json(
            r#"{"primary_token": "abc123", "rss_urls": ["https://example.com/rss"]}"#,
        );
        let config = ConfigLoader::new().with_file(path).load().unwrap();
        assert_eq!(config.primary_token, "abc123");
        assert_eq!(config.rss_urls.len(), 1);
    }
}
