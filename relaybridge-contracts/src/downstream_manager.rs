//! The downstream acquisition-manager protocol (spec §6): the shape every
//! Sonarr-like or Radarr-like manager is driven through.

use async_trait::async_trait;
use thiserror::Error;

use relaybridge_model::{
    DownstreamKind, InstanceId, MinimumAvailability, SeasonMonitoring, SeriesType,
};

#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("downstream instance unreachable: {0}")]
    Unreachable(String),

    #[error("downstream rejected request: {0}")]
    Rejected(String),

    #[error("rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("item not found on downstream instance")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DownstreamError>;

/// A single downstream tag, as reported by `fetch_tags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamTag {
    pub id: u32,
    pub label: String,
}

/// A downstream library item, as reported by `fetch_all_items`.
#[derive(Debug, Clone)]
pub struct DownstreamItem {
    pub external_id: String,
    pub title: String,
    pub guids: Vec<relaybridge_model::Guid>,
    pub tags: Vec<u32>,
}

/// One request to add content to a downstream instance (spec §6: "add item").
///
/// `season_monitoring`/`series_type` apply to Sonarr-like managers;
/// `minimum_availability` applies to Radarr-like managers. A given manager
/// implementation only reads the fields relevant to its
/// [`DownstreamKind`].
#[derive(Debug, Clone)]
pub struct AddRequest {
    pub external_id: String,
    pub root_folder: Option<String>,
    pub quality_profile_id: Option<i32>,
    pub tags: Vec<String>,
    pub search_on_add: bool,
    pub season_monitoring: Option<SeasonMonitoring>,
    pub series_type: Option<SeriesType>,
    pub minimum_availability: Option<MinimumAvailability>,
}

/// Operations every downstream acquisition manager must provide (spec §6).
///
/// Implementations are expected to go through the rate-limited client in
/// `relaybridge-core::client` rather than issuing requests directly.
#[async_trait]
pub trait DownstreamManager: Send + Sync {
    fn instance_id(&self) -> InstanceId;

    fn kind(&self) -> DownstreamKind;

    async fn test_connection(&self) -> Result<()>;

    async fn fetch_all_items(&self) -> Result<Vec<DownstreamItem>>;

    async fn lookup_by_external_id(&self, external_id: &str) -> Result<Option<DownstreamItem>>;

    async fn add_item(&self, request: AddRequest) -> Result<DownstreamItem>;

    async fn fetch_tags(&self) -> Result<Vec<DownstreamTag>>;

    async fn install_webhook(&self, callback_url: &str) -> Result<()>;

    async fn remove_webhook(&self) -> Result<()>;
}
