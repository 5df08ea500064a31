//! The watchlist-source protocol (spec §6): everywhere a watchlist item can
//! come from.

use async_trait::async_trait;
use thiserror::Error;

use relaybridge_model::UserId;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// One raw entry as returned by a watchlist source, prior to classification.
#[derive(Debug, Clone)]
pub struct RawWatchlistEntry {
    pub key: String,
    pub title: String,
    pub thumb: Option<String>,
    pub guids: Vec<String>,
    pub genres: Vec<String>,
    pub is_show: bool,
}

/// A friend account discoverable through the primary token (spec §4.B).
#[derive(Debug, Clone)]
pub struct FriendAccount {
    pub user_id: Option<UserId>,
    pub plex_uuid: String,
    pub name: String,
}

/// A page of results, with an opaque cursor for the next page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Sources of watchlist entries (spec §6): self-watchlist REST, friend
/// watchlists via GraphQL, optional RSS, and friend enumeration.
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    async fn fetch_self_watchlist(&self, cursor: Option<&str>) -> Result<Page<RawWatchlistEntry>>;

    async fn fetch_friend_watchlist(
        &self,
        friend_plex_uuid: &str,
        cursor: Option<&str>,
    ) -> Result<Page<RawWatchlistEntry>>;

    async fn fetch_rss_feed(&self, url: &str) -> Result<Vec<RawWatchlistEntry>>;

    async fn list_friends(&self) -> Result<Vec<FriendAccount>>;
}
