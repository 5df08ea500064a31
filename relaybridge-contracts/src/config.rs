//! The versioned-config mutation contract (spec §6): config mutations are
//! transactional, and the in-memory copy only refreshes after a commit
//! succeeds. The concrete `Config` type lives in `relaybridge-config`; this
//! trait lets `relaybridge-core` depend on the mutation contract without
//! depending on the loader crate.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config failed validation: {0}")]
    Invalid(String),

    #[error("config version {expected} expected, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// A transactional store over the running configuration.
///
/// `update` receives the current snapshot, applies the caller's patch, and
/// either commits it and refreshes the in-memory copy, or leaves the
/// previous config untouched.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The current in-memory configuration, serialized.
    async fn snapshot(&self) -> Value;

    /// Merges `patch` into the current config, validates it, and commits it
    /// atomically. Returns the resulting snapshot.
    async fn update(&self, patch: Value) -> Result<Value>;
}
