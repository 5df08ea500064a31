//! Metadata enrichment: canonical GUID expansion, genres, language,
//! certification, ratings, and provider availability (spec §4.C).
//!
//! Grounded on `ferrex-core::infra::media::providers::tmdb_api_provider`
//! (`ProviderError`, the status-code-to-error mapping in `get_tmdb_json`:
//! 401 -> invalid key, 404 -> not found, 429 -> rate limited, otherwise ->
//! `ApiError(message)`) — reused for the TMDB sub-fetch and generalized to a
//! trait so non-TMDB ancillary rating sources plug in the same way.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use relaybridge_model::{ContentType, Guid};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("provider error: {0}")]
    Api(String),

    #[error("not found")]
    NotFound,

    #[error("rate limited")]
    RateLimited,

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

impl MetadataError {
    /// Maps an HTTP status code to the typed error the teacher's TMDB
    /// provider uses (spec §4.C).
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => MetadataError::InvalidApiKey,
            404 => MetadataError::NotFound,
            429 => MetadataError::RateLimited,
            _ => MetadataError::Api(message),
        }
    }
}

/// What a lookup resolves (spec §4.C): canonical GUIDs, genres, language,
/// certification, and ancillary ratings, as much of it as could be fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedMetadata {
    pub guids: Vec<Guid>,
    pub genres: Vec<String>,
    pub language: Option<String>,
    pub certification: Option<String>,
    pub ratings: Vec<Rating>,
    pub provider_available_in_region: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    pub source: String,
    pub value: f32,
}

/// A single ancillary metadata source (TMDB, or any other); `lookup`
/// resolves whatever slice of [`EnrichedMetadata`] that source can provide.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup(&self, content_type: ContentType, key: &str, region: Option<&str>) -> Result<EnrichedMetadata>;
}

/// Merges one provider's partial result into the accumulator without
/// overwriting fields already populated, so the first successful provider
/// to answer a given field wins (spec §4.C "idempotent... converge on the
/// same output").
fn merge(acc: &mut EnrichedMetadata, incoming: EnrichedMetadata) {
    for guid in incoming.guids {
        if !acc.guids.contains(&guid) {
            acc.guids.push(guid);
        }
    }
    for genre in incoming.genres {
        if !acc.genres.iter().any(|g| g.eq_ignore_ascii_case(&genre)) {
            acc.genres.push(genre);
        }
    }
    acc.language = acc.language.take().or(incoming.language);
    acc.certification = acc.certification.take().or(incoming.certification);
    acc.ratings.extend(incoming.ratings);
    acc.provider_available_in_region = acc.provider_available_in_region.or(incoming.provider_available_in_region);
}

/// Enriches `key` by consulting every provider in order, merging whatever
/// each one successfully returns. A sub-fetch failure is logged and
/// skipped, leaving the rest of the result intact (spec §4.C "best-effort";
/// "any sub-fetch failure yields a partial result with the rest intact").
pub async fn enrich(
    providers: &[Box<dyn MetadataProvider>],
    content_type: ContentType,
    key: &str,
    region: Option<&str>,
) -> EnrichedMetadata {
    let mut acc = EnrichedMetadata::default();
    for provider in providers {
        match provider.lookup(content_type, key, region).await {
            Ok(result) => merge(&mut acc, result),
            Err(err) => warn!(provider = provider.name(), %key, error = %err, "metadata sub-fetch failed, continuing with partial result"),
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;
    #[async_trait]
    impl MetadataProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn lookup(&self, _content_type: ContentType, _key: &str, _region: Option<&str>) -> Result<EnrichedMetadata> {
            Err(MetadataError::NotFound)
        }
    }

    struct GenreProvider;
    #[async_trait]
    impl MetadataProvider for GenreProvider {
        fn name(&self) -> &'static str {
            "genres"
        }
        async fn lookup(&self, _content_type: ContentType, _key: &str, _region: Option<&str>) -> Result<EnrichedMetadata> {
            Ok(EnrichedMetadata { genres: vec!["Drama".into()], ..Default::default() })
        }
    }

    #[tokio::test]
    async fn sub_fetch_failure_yields_partial_result() {
        let providers: Vec<Box<dyn MetadataProvider>> = vec![Box::new(FailingProvider), Box::new(GenreProvider)];
        let result = enrich(&providers, ContentType::Movie, "42", None).await;
        assert_eq!(result.genres, vec!["Drama".to_string()]);
    }

    #[tokio::test]
    async fn enrichment_is_idempotent() {
        let providers: Vec<Box<dyn MetadataProvider>> = vec![Box::new(GenreProvider)];
        let first = enrich(&providers, ContentType::Movie, "42", None).await;
        let second = enrich(&providers, ContentType::Movie, "42", None).await;
        assert_eq!(first, second);
    }

    #[test]
    fn status_mapping_matches_teacher_provider() {
        assert!(matches!(MetadataError::from_status(401, String::new()), MetadataError::InvalidApiKey));
        assert!(matches!(MetadataError::from_status(404, String::new()), MetadataError::NotFound));
        assert!(matches!(MetadataError::from_status(429, String::new()), MetadataError::RateLimited));
        assert!(matches!(MetadataError::from_status(500, "boom".into()), MetadataError::Api(_)));
    }
}
