//! The watchlist ingester: acquire, classify, persist (spec §4.B).
//!
//! The provenance enum mirrors `ferrex-core::scan::orchestration::job::ScanReason`;
//! the per-user degraded-mode fallback to the last persisted snapshot mirrors
//! the "fall back to last known state" framing around
//! `ferrex-core::scan::orchestration::actors::messages::FolderScanSummary`.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

use relaybridge_contracts::persistence::{RepositoryError, WatchlistRepository};
use relaybridge_contracts::watchlist_source::{RawWatchlistEntry, SourceError, WatchlistSource};
use relaybridge_model::{ContentType, Guid, User, UserId, WatchlistItem, WatchlistItemId, WatchlistStatus};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Why this ingest run was triggered (spec §4.B, supplemented — mirrors the
/// teacher's `ScanReason`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestTrigger {
    Scheduled,
    Manual,
    Rss,
}

/// Back-end for the degraded-mode fallback: the last snapshot of a user's
/// watchlist this process successfully persisted (spec §4.B "Partial
/// failure per user degrades to the last persisted snapshot for that
/// user").
#[async_trait]
pub trait PersistedSnapshotSource: Send + Sync {
    async fn last_snapshot(&self, user_id: UserId) -> std::result::Result<Vec<WatchlistItem>, RepositoryError>;
}

#[async_trait]
impl<T: WatchlistRepository> PersistedSnapshotSource for T {
    async fn last_snapshot(&self, user_id: UserId) -> std::result::Result<Vec<WatchlistItem>, RepositoryError> {
        self.list_for_user(user_id).await
    }
}

/// A raw entry normalized for classification: external key, title, and
/// parsed (lowercased) GUIDs.
#[derive(Debug, Clone)]
pub struct AcquiredItem {
    pub key: String,
    pub title: String,
    pub thumb: Option<String>,
    pub guids: Vec<Guid>,
    pub genres: Vec<String>,
    pub content_type: ContentType,
}

fn normalize(entry: RawWatchlistEntry) -> AcquiredItem {
    let guids = entry
        .guids
        .into_iter()
        .filter_map(|raw| match Guid::parse(&raw) {
            Ok(guid) => Some(guid),
            Err(_) => {
                warn!(raw, "dropping malformed guid during ingest normalization");
                None
            }
        })
        .collect();
    AcquiredItem {
        key: entry.key,
        title: entry.title,
        thumb: entry.thumb,
        guids,
        genres: entry.genres,
        content_type: if entry.is_show { ContentType::Show } else { ContentType::Movie },
    }
}

/// Step 1 (spec §4.B "Acquire"): pages through `source` for `user`,
/// deduplicating by external key across pages.
#[instrument(skip(source))]
pub async fn acquire_self_watchlist(source: &dyn WatchlistSource) -> Result<Vec<AcquiredItem>> {
    let mut cursor = None;
    let mut seen = std::collections::HashSet::new();
    let mut items = Vec::new();
    loop {
        let page = source.fetch_self_watchlist(cursor.as_deref()).await?;
        for entry in page.items {
            if seen.insert(entry.key.clone()) {
                items.push(normalize(entry));
            }
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(items)
}

#[instrument(skip(source))]
pub async fn acquire_friend_watchlist(source: &dyn WatchlistSource, friend_plex_uuid: &str) -> Result<Vec<AcquiredItem>> {
    let mut cursor = None;
    let mut seen = std::collections::HashSet::new();
    let mut items = Vec::new();
    loop {
        let page = source.fetch_friend_watchlist(friend_plex_uuid, cursor.as_deref()).await?;
        for entry in page.items {
            if seen.insert(entry.key.clone()) {
                items.push(normalize(entry));
            }
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(items)
}

/// Step 2 (spec §4.B "Classify"): splits acquired items into those unknown
/// to this user (brand-new) versus already known under another user
/// (existing-to-link). `force_refresh` treats every item as brand-new.
pub enum Classification {
    BrandNew(AcquiredItem),
    ExistingToLink { acquired: AcquiredItem, existing: WatchlistItem },
}

pub async fn classify(
    repo: &dyn WatchlistRepository,
    user_id: UserId,
    acquired: Vec<AcquiredItem>,
    force_refresh: bool,
) -> Result<Vec<Classification>> {
    let mut out = Vec::with_capacity(acquired.len());
    for item in acquired {
        if force_refresh {
            out.push(Classification::BrandNew(item));
            continue;
        }
        match repo.find_by_user_and_key(user_id, &item.key).await? {
            Some(existing) => out.push(Classification::ExistingToLink { acquired: item, existing }),
            None => out.push(Classification::BrandNew(item)),
        }
    }
    Ok(out)
}

/// Runs one user's full ingest pipeline (acquire -> classify -> persist),
/// falling back to the last persisted snapshot on a complete source failure
/// so other users' data is never touched (spec §4.B guarantee).
#[instrument(skip(source, repo, snapshot, enrich))]
pub async fn ingest_user<F, Fut>(
    source: &dyn WatchlistSource,
    repo: &dyn WatchlistRepository,
    snapshot: &dyn PersistedSnapshotSource,
    user: &User,
    force_refresh: bool,
    mut enrich: F,
) -> Vec<WatchlistItem>
where
    F: FnMut(AcquiredItem) -> Fut,
    Fut: std::future::Future<Output = WatchlistItem>,
{
    let acquired = if user.is_primary_token {
        acquire_self_watchlist(source).await
    } else {
        match &user.plex_uuid {
            Some(uuid) => acquire_friend_watchlist(source, uuid).await,
            None => Ok(Vec::new()),
        }
    };

    let acquired = match acquired {
        Ok(items) => items,
        Err(err) => {
            warn!(user_id = %user.id, error = %err, "ingest source failed, falling back to last persisted snapshot");
            return snapshot.last_snapshot(user.id).await.unwrap_or_default();
        }
    };

    let current_keys: std::collections::HashSet<String> = acquired.iter().map(|i| i.key.clone()).collect();
    let classified = match classify(repo, user.id, acquired, force_refresh).await {
        Ok(c) => c,
        Err(err) => {
            warn!(user_id = %user.id, error = %err, "classification failed, falling back to last persisted snapshot");
            return snapshot.last_snapshot(user.id).await.unwrap_or_default();
        }
    };

    let mut persisted = Vec::new();
    for entry in classified {
        let item = match entry {
            Classification::BrandNew(acquired) => enrich(acquired).await,
            Classification::ExistingToLink { existing, .. } => existing,
        };
        persisted.push(item);
    }

    // Step 3 (spec §4.B "Persist"): items absent from the latest snapshot
    // are marked removed for this user only.
    if let Ok(previously_persisted) = repo.list_for_user(user.id).await {
        for stale in previously_persisted.into_iter().filter(|p| !current_keys.contains(&p.key)) {
            if let Err(err) = repo.delete(stale.id).await {
                warn!(item_id = %stale.id, error = %err, "failed to remove stale watchlist item for user");
            }
        }
    }

    for item in &persisted {
        if let Err(err) = repo.upsert(item).await {
            warn!(item_id = %item.id, error = %err, "failed to persist watchlist item");
        }
    }

    info!(user_id = %user.id, count = persisted.len(), "ingest completed");
    persisted
}

/// Materializes a brand-new acquired item into a persistable
/// [`WatchlistItem`] with no downstream linkage yet; callers enrich it via
/// `relaybridge_core::metadata` before persisting.
pub fn to_watchlist_item(user_id: UserId, acquired: AcquiredItem) -> WatchlistItem {
    let now = chrono::Utc::now();
    WatchlistItem {
        id: WatchlistItemId::new(),
        user_id,
        key: acquired.key,
        title: acquired.title,
        content_type: acquired.content_type,
        thumb: acquired.thumb,
        added: Some(now),
        guids: acquired.guids,
        genres: acquired.genres,
        status: WatchlistStatus::Pending,
        series_status: None,
        movie_status: None,
        sonarr_instance_id: None,
        radarr_instance_id: None,
        last_notified_at: None,
        created_at: now,
        updated_at: now,
    }
}
