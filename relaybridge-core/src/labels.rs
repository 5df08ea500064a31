//! Label/tag sync (spec §4.I): keeps library labels in sync with the set of
//! users who currently have an item in their watchlist.
//!
//! Grounded on `ferrex-core::scan::orchestration`'s actor fan-out style and
//! the bounded-concurrency precedent of `ferrex-core::scan::orchestration::job::ImageFetchJob`,
//! which runs a per-item operation through the dispatcher under a
//! configured concurrency cap; reused here for the per-library-entity label
//! sync/cleanup/remove fan-out.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

use relaybridge_contracts::persistence::{LabelTrackingRepository, RepositoryError};
use relaybridge_contracts::progress_events::{ProgressEvent, ProgressEventKind, ProgressPublisher};
use relaybridge_model::{LabelTracking, RemovedUserPolicy, WatchlistItemId};

#[derive(Debug, Error)]
pub enum LabelSyncError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, LabelSyncError>;

/// A mutation the sync pass wants applied to one library entity's label set
/// (spec §4.I "apply delta").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelDelta {
    Add(String),
    Remove(String),
}

/// Operations the library backend must expose for label mutation; kept
/// separate from [`LabelTrackingRepository`] because it talks to the
/// library (Plex), not this crate's own persistence facade.
#[async_trait::async_trait]
pub trait LibraryLabelClient: Send + Sync {
    async fn apply_label(&self, plex_rating_key: &str, label: &str) -> std::result::Result<(), String>;

    async fn remove_label(&self, plex_rating_key: &str, label: &str) -> std::result::Result<(), String>;
}

/// Computes the desired label set for one library entity: one
/// `{prefix}:{username}` per current owner, plus any mirrored downstream
/// tags (spec §4.I "Sync").
pub fn desired_labels(prefix: &str, current_owners: &[String], mirrored_tags: &[String]) -> HashSet<String> {
    let mut labels: HashSet<String> = current_owners.iter().map(|user| format!("{prefix}:{user}")).collect();
    labels.extend(mirrored_tags.iter().cloned());
    labels
}

/// Diffs `desired` against what this system previously tracked as applied,
/// yielding only the deltas actually needed (spec §4.I: "apply delta: add
/// missing, remove stale that the system previously applied — never remove
/// labels it did not track").
pub fn compute_delta(desired: &HashSet<String>, previously_tracked: &HashSet<String>) -> Vec<LabelDelta> {
    let mut deltas = Vec::new();
    for label in desired {
        if !previously_tracked.contains(label) {
            deltas.push(LabelDelta::Add(label.clone()));
        }
    }
    for label in previously_tracked {
        if !desired.contains(label) {
            deltas.push(LabelDelta::Remove(label.clone()));
        }
    }
    deltas
}

/// One library entity to sync: its watchlist item id, Plex rating key, and
/// current watchlist owners.
pub struct SyncTarget {
    pub watchlist_id: WatchlistItemId,
    pub plex_rating_key: String,
    pub current_owners: Vec<String>,
    pub mirrored_tags: Vec<String>,
}

/// Runs the sync pass over `targets`, bounded by `concurrency` (clamped to
/// spec §4.I's `1..=20`), applying each target's deltas in its own task
/// gated by a shared permit so `concurrency` actually bounds in-flight
/// work (mirrors `reconcile::submit_fanout`'s spawn-under-semaphore shape),
/// emitting a progress event per completed target (spec §4.I, §4.J).
pub async fn sync(
    repo: Arc<dyn LabelTrackingRepository>,
    client: Arc<dyn LibraryLabelClient>,
    prefix: &str,
    targets: Vec<SyncTarget>,
    concurrency: usize,
    progress: &dyn ProgressPublisher,
) -> Result<()> {
    let bounded = concurrency.clamp(1, 20);
    let semaphore = Arc::new(Semaphore::new(bounded));
    let total = targets.len().max(1);
    let mut handles = Vec::with_capacity(targets.len());

    for target in targets {
        let previously_tracked: HashSet<String> = repo
            .list_for_watchlist_item(target.watchlist_id)
            .await?
            .into_iter()
            .map(|t| t.label_applied)
            .collect();
        let desired = desired_labels(prefix, &target.current_owners, &target.mirrored_tags);
        let deltas = compute_delta(&desired, &previously_tracked);
        if deltas.is_empty() {
            continue;
        }
        let watchlist_id = target.watchlist_id;
        let rating_key = target.plex_rating_key;
        let repo = repo.clone();
        let client = client.clone();
        let permit = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore never closed");
            apply_deltas(repo.as_ref(), client.as_ref(), watchlist_id, &rating_key, deltas).await
        }));
    }

    let mut completed = 0usize;
    let mut first_error = None;
    for handle in handles {
        let result = handle.await.expect("label sync task panicked");
        completed += 1;
        if progress.has_active_subscribers() {
            let pct = ((completed * 100) / total) as u8;
            progress.publish(ProgressEvent::new(ProgressEventKind::SonarrTagging, None, pct, "syncing labels"));
        }
        if let Err(err) = result {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn apply_deltas(
    repo: &dyn LabelTrackingRepository,
    client: &dyn LibraryLabelClient,
    watchlist_id: WatchlistItemId,
    rating_key: &str,
    deltas: Vec<LabelDelta>,
) -> Result<()> {
    for delta in deltas {
        match delta {
            LabelDelta::Add(label) => {
                if let Err(err) = client.apply_label(rating_key, &label).await {
                    warn!(rating_key, label, error = %err, "failed to apply label");
                    continue;
                }
                repo.record(&LabelTracking { watchlist_id, plex_rating_key: rating_key.to_string(), label_applied: label })
                    .await?;
            }
            LabelDelta::Remove(label) => {
                if let Err(err) = client.remove_label(rating_key, &label).await {
                    warn!(rating_key, label, error = %err, "failed to remove label");
                    continue;
                }
                repo.remove(watchlist_id, &label).await?;
            }
        }
    }
    Ok(())
}

/// Cleanup pass (spec §4.I "Cleanup"): removes labels for deleted users and
/// orphaned tracking entries.
pub async fn cleanup(
    repo: &dyn LabelTrackingRepository,
    client: &dyn LibraryLabelClient,
    deleted_usernames: &[String],
    prefix: &str,
) -> Result<()> {
    for username in deleted_usernames {
        let label = format!("{prefix}:{username}");
        for tracking in repo.list_for_label(&label).await? {
            if let Err(err) = client.remove_label(&tracking.plex_rating_key, &label).await {
                warn!(label, error = %err, "failed to remove orphaned label during cleanup");
                continue;
            }
            repo.remove(tracking.watchlist_id, &label).await?;
        }
    }
    Ok(())
}

/// Applies the removed-user policy to one user's previously-applied labels
/// (spec §4.I "Removed-user policy").
pub async fn apply_removed_user_policy(
    repo: &dyn LabelTrackingRepository,
    client: &dyn LibraryLabelClient,
    username: &str,
    prefix: &str,
    policy: RemovedUserPolicy,
) -> Result<()> {
    let label = format!("{prefix}:{username}");
    match policy {
        RemovedUserPolicy::Keep => Ok(()),
        RemovedUserPolicy::Remove => cleanup(repo, client, std::slice::from_ref(&username.to_string()), prefix).await,
        RemovedUserPolicy::SpecialLabel => {
            let replacement = format!("removed-{prefix}:{username}");
            for tracking in repo.list_for_label(&label).await? {
                if client.apply_label(&tracking.plex_rating_key, &replacement).await.is_ok() {
                    repo.record(&LabelTracking {
                        watchlist_id: tracking.watchlist_id,
                        plex_rating_key: tracking.plex_rating_key.clone(),
                        label_applied: replacement.clone(),
                    })
                    .await?;
                }
                if client.remove_label(&tracking.plex_rating_key, &label).await.is_ok() {
                    repo.remove(tracking.watchlist_id, &label).await?;
                }
            }
            Ok(())
        }
    }
}

/// Remove pass (spec §4.I "Remove"): deletes every label this system
/// applied, optionally also the label definitions (left to the caller's
/// library client, which may no-op `remove_label` for a definition delete).
pub async fn remove_all(repo: &dyn LabelTrackingRepository, client: &dyn LibraryLabelClient, all_tracked: Vec<LabelTracking>) -> Result<()> {
    for tracking in all_tracked {
        if let Err(err) = client.remove_label(&tracking.plex_rating_key, &tracking.label_applied).await {
            warn!(label = tracking.label_applied, error = %err, "failed to remove label during full teardown");
            continue;
        }
        repo.remove(tracking.watchlist_id, &tracking.label_applied).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_only_adds_missing_and_removes_stale() {
        let desired: HashSet<String> = ["relaybridge:alice".to_string(), "relaybridge:bob".to_string()].into();
        let tracked: HashSet<String> = ["relaybridge:alice".to_string(), "relaybridge:carol".to_string()].into();
        let mut deltas = compute_delta(&desired, &tracked);
        deltas.sort_by_key(|d| match d {
            LabelDelta::Add(l) | LabelDelta::Remove(l) => l.clone(),
        });
        assert_eq!(
            deltas,
            vec![LabelDelta::Add("relaybridge:bob".to_string()), LabelDelta::Remove("relaybridge:carol".to_string())]
        );
    }

    #[test]
    fn no_delta_when_already_in_sync() {
        let set: HashSet<String> = ["relaybridge:alice".to_string()].into();
        assert!(compute_delta(&set, &set).is_empty());
    }

    #[test]
    fn desired_labels_includes_mirrored_tags() {
        let labels = desired_labels("relaybridge", &["alice".to_string()], &["4k".to_string()]);
        assert!(labels.contains("relaybridge:alice"));
        assert!(labels.contains("4k"));
    }
}
