//! Status processor & reconciler: diff local watchlist state against a
//! downstream manager and emit the minimal update set (spec §4.F).
//!
//! The diff-then-bulk-apply shape is grounded on
//! `ferrex-core::scan::orchestration::dispatcher`; the "only one update-path
//! per key at a time" logical lock (spec §5) is grounded on
//! `ferrex-core::scan::orchestration::lease::JobLease` and reused here as a
//! `dashmap`-backed keyed mutex rather than a lease (no renewal/expiry
//! semantics are needed for an in-process lock).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tracing::warn;

use relaybridge_contracts::downstream_manager::{DownstreamItem, DownstreamManager};
use relaybridge_contracts::progress_events::{ProgressEvent, ProgressEventKind, ProgressPublisher};
use relaybridge_model::{
    MovieAvailability, RollingMonitoringState, SeriesStatus, UserId, WatchlistItem, WatchlistStatus,
    WatchlistStatusHistoryEntry,
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("downstream error: {0}")]
    Downstream(#[from] relaybridge_contracts::downstream_manager::DownstreamError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Serializes updates to the same `(user_id, key)` so at most one update
/// path runs at a time for a given item (spec §5).
#[derive(Default)]
pub struct KeyedMutex {
    locks: DashMap<(UserId, String), Arc<Mutex<()>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: (UserId, String)) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        mutex.lock_owned().await
    }
}

/// One proposed mutation to a local watchlist item, beyond identity (spec
/// §4.F "Only changes beyond identity...are emitted").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub added: Option<DateTime<Utc>>,
    pub status: Option<WatchlistStatus>,
    pub movie_status: Option<MovieAvailability>,
    pub series_status: Option<SeriesStatus>,
    pub sonarr_instance_id: Option<relaybridge_model::InstanceId>,
    pub history_entry: Option<WatchlistStatusHistoryEntry>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ItemUpdate::default()
    }
}

fn parse_movie_status(value: &str) -> Option<MovieAvailability> {
    match value {
        "available" => Some(MovieAvailability::Available),
        "unavailable" => Some(MovieAvailability::Unavailable),
        other => {
            warn!(value = other, "rejecting unrecognized movie_status from downstream");
            None
        }
    }
}

/// Diffs one local item against its matched downstream counterpart and
/// computes the minimal update (spec §4.F).
///
/// `downstream_status` and `downstream_movie_status`/`downstream_series_status`
/// are the downstream manager's reported lifecycle fields, already mapped by
/// the caller from that manager's wire shape.
pub fn diff_item(
    local: &WatchlistItem,
    downstream_added: Option<DateTime<Utc>>,
    downstream_status: Option<WatchlistStatus>,
    downstream_movie_status: Option<&str>,
    downstream_series_status: Option<SeriesStatus>,
    downstream_sonarr_instance_id: Option<relaybridge_model::InstanceId>,
) -> ItemUpdate {
    let mut update = ItemUpdate::default();

    if let Some(added) = downstream_added {
        if local.added.is_none_or(|current| added > current) {
            update.added = Some(added);
        }
    }

    if let Some(reported) = downstream_status {
        match local.status.advance_to(reported) {
            Ok(advanced) if advanced != local.status => update.status = Some(advanced),
            Ok(_) => {}
            Err(_) => {
                // Local is `Notified` and downstream regressed or reports
                // `Grabbed`: never downgrade the live status, but backfill a
                // dated history entry if downstream reports `Grabbed` (spec
                // §4.F "backfill").
                if reported == WatchlistStatus::Grabbed {
                    update.history_entry = Some(WatchlistStatusHistoryEntry {
                        watchlist_item_id: local.id,
                        status: reported,
                        observed_at: downstream_added.unwrap_or(local.updated_at),
                        backfilled: true,
                    });
                }
            }
        }
    }

    if local.content_type == relaybridge_model::ContentType::Movie {
        if let Some(raw) = downstream_movie_status {
            if let Some(parsed) = parse_movie_status(raw) {
                if local.movie_status != Some(parsed) {
                    update.movie_status = Some(parsed);
                }
            }
        }
    }

    if local.content_type == relaybridge_model::ContentType::Show {
        if let Some(series_status) = downstream_series_status {
            if local.series_status != Some(series_status) {
                update.series_status = Some(series_status);
            }
        }
        if let Some(instance_id) = downstream_sonarr_instance_id {
            if local.sonarr_instance_id != Some(instance_id) {
                update.sonarr_instance_id = Some(instance_id);
            }
        }
    }

    update
}

/// Matches a local item against a downstream snapshot by GUID intersection
/// (spec §4.F, §3 "GUID matching").
pub fn match_downstream<'a>(local: &WatchlistItem, downstream_items: &'a [DownstreamItem]) -> Option<&'a DownstreamItem> {
    downstream_items
        .iter()
        .find(|d| relaybridge_model::guid_sets_intersect(&local.guids, &d.guids))
}

/// Batched fan-out: submits `add` to `primary` and every synced target in
/// parallel, bounded by `concurrency`, emitting a progress event after each
/// completion (spec §4.F "Batched fan-out").
pub async fn submit_fanout(
    managers: &[Arc<dyn DownstreamManager>],
    specs: &[relaybridge_model::RoutingSpec],
    concurrency: usize,
    progress: &dyn ProgressPublisher,
    user_id: Option<UserId>,
) -> Vec<Result<DownstreamItem>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = specs.len().max(1);
    let mut handles = Vec::with_capacity(specs.len());

    for (idx, spec) in specs.iter().enumerate() {
        let Some(manager) = managers.iter().find(|m| m.instance_id() == spec.instance_id).cloned() else {
            continue;
        };
        let request = build_add_request(spec);
        let permit = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore never closed");
            let result = manager.add_item(request).await;
            (idx, result)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut completed = 0usize;
    for handle in handles {
        let (_, result) = handle.await.expect("fan-out task panicked");
        completed += 1;
        if progress.has_active_subscribers() {
            let pct = ((completed * 100) / total) as u8;
            progress.publish(ProgressEvent::new(ProgressEventKind::Sync, user_id, pct, "submitting routing fan-out"));
        }
        results.push(result.map_err(ReconcileError::from));
    }
    results
}

fn build_add_request(spec: &relaybridge_model::RoutingSpec) -> relaybridge_contracts::downstream_manager::AddRequest {
    relaybridge_contracts::downstream_manager::AddRequest {
        external_id: String::new(),
        root_folder: spec.root_folder.clone(),
        quality_profile_id: None,
        tags: spec.tags.clone(),
        search_on_add: spec.search_on_add.unwrap_or(false),
        season_monitoring: spec.season_monitoring,
        series_type: spec.series_type,
        minimum_availability: spec.minimum_availability,
    }
}

/// Rolling-monitoring expansion policy decision: given `state` and how far
/// into the currently monitored season a user's session progress has
/// advanced, decide whether to expand to the next season (spec §4.F
/// "Rolling monitoring expansion", spec §9 Open Question ii — resolved here
/// as: expand exactly one season ahead once progress crosses the
/// configured threshold, deterministic given the inputs).
pub fn should_expand_rolling(progress_fraction: f32, expand_threshold: f32) -> bool {
    progress_fraction >= expand_threshold
}

/// True when a rolling show has had no session-progress input for longer
/// than `inactivity_window`, and should reset to its starting monitoring
/// configuration (spec §4.F "Inactive rolling shows...auto-reset").
pub fn should_reset_for_inactivity(state: &RollingMonitoringState, now: DateTime<Utc>, inactivity_window: chrono::Duration) -> bool {
    match state.last_session_progress_at {
        Some(last) => now - last > inactivity_window,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybridge_model::{ContentType, UserId, WatchlistItemId};

    fn sample(status: WatchlistStatus) -> WatchlistItem {
        WatchlistItem {
            id: WatchlistItemId::new(),
            user_id: UserId::new(),
            key: "1".into(),
            title: "Movie".into(),
            content_type: ContentType::Movie,
            thumb: None,
            added: None,
            guids: Vec::new(),
            genres: Vec::new(),
            status,
            series_status: None,
            movie_status: None,
            sonarr_instance_id: None,
            radarr_instance_id: None,
            last_notified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn no_downgrade_but_backfills_grabbed() {
        let local = sample(WatchlistStatus::Notified);
        let update = diff_item(&local, None, Some(WatchlistStatus::Grabbed), None, None, None);
        assert!(update.status.is_none());
        assert!(update.history_entry.is_some());
    }

    #[test]
    fn reconciling_twice_produces_no_updates_second_time() {
        let mut local = sample(WatchlistStatus::Requested);
        let first = diff_item(&local, None, Some(WatchlistStatus::Grabbed), None, None, None);
        assert_eq!(first.status, Some(WatchlistStatus::Grabbed));
        local.status = WatchlistStatus::Grabbed;
        let second = diff_item(&local, None, Some(WatchlistStatus::Grabbed), None, None, None);
        assert!(second.is_empty());
    }

    #[test]
    fn rejects_unrecognized_movie_status() {
        assert!(parse_movie_status("bogus").is_none());
        assert_eq!(parse_movie_status("available"), Some(MovieAvailability::Available));
    }

    #[tokio::test]
    async fn keyed_mutex_serializes_same_key() {
        let mutex = KeyedMutex::new();
        let key = (UserId::new(), "1".to_string());
        let _guard = mutex.lock(key.clone()).await;
        // A second lock on the same key must wait for the first to drop;
        // exercised implicitly by lock ordering rather than a timeout here.
        drop(_guard);
        let _guard2 = mutex.lock(key).await;
    }

    #[test]
    fn expansion_threshold_is_deterministic() {
        assert!(should_expand_rolling(0.85, 0.8));
        assert!(!should_expand_rolling(0.5, 0.8));
    }

    #[test]
    fn matches_downstream_item_by_guid_overlap() {
        let mut local = sample(WatchlistStatus::Pending);
        let guid = relaybridge_model::Guid::parse("imdb://tt0111161").unwrap();
        local.guids.push(guid.clone());
        let downstream_items = vec![
            DownstreamItem { external_id: "99".into(), title: "Other".into(), guids: vec![guid], tags: Vec::new() },
            DownstreamItem { external_id: "100".into(), title: "Unrelated".into(), guids: Vec::new(), tags: Vec::new() },
        ];
        let matched = match_downstream(&local, &downstream_items).unwrap();
        assert_eq!(matched.external_id, "99");
    }

    #[test]
    fn no_match_when_no_guid_overlap() {
        let local = sample(WatchlistStatus::Pending);
        let downstream_items =
            vec![DownstreamItem { external_id: "1".into(), title: "Movie".into(), guids: Vec::new(), tags: Vec::new() }];
        assert!(match_downstream(&local, &downstream_items).is_none());
    }
}
