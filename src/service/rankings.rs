//! Ranking service: the operations exposed to request handlers
//!
//! Every read-modify-write of a collection's snapshot runs while holding
//! that collection's lock, and snapshot writes are compare-and-save against
//! the version the vote was computed from. A vote that loses the race to
//! another writer is recomputed from the fresh snapshot.

use crate::error::{RankingError, Result};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::rating::{compute_analytics, select_matchup, RankingEngine, VoteAnalytics};
use crate::source::TrackSource;
use crate::storage::RankingStore;
use crate::types::{Matchup, RankingSnapshot, TrackId, VoteRequest};
use crate::utils::current_timestamp;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// One async lock per collection id
#[derive(Debug, Default)]
pub struct CollectionLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `collection_id`
    pub async fn lock(&self, collection_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(collection_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Check a submitted vote before touching the engine or the store
pub fn validate_vote_request(request: &VoteRequest) -> Result<(TrackId, TrackId)> {
    let winner = request
        .winner_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let loser = request
        .loser_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    match (winner, loser) {
        (Some(winner), Some(loser)) if winner == loser => Err(RankingError::InvalidVote {
            reason: "winnerId and loserId must differ".to_string(),
        }
        .into()),
        (Some(winner), Some(loser)) => Ok((winner.to_string(), loser.to_string())),
        _ => Err(RankingError::InvalidVote {
            reason: "winnerId and loserId are required".to_string(),
        }
        .into()),
    }
}

pub struct RankingService {
    collection_id: String,
    collection_name: String,
    engine: RankingEngine,
    store: Arc<RankingStore>,
    source: Arc<dyn TrackSource>,
    locks: CollectionLocks,
    max_vote_attempts: u32,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RankingService {
    pub fn new(
        collection_id: impl Into<String>,
        collection_name: impl Into<String>,
        engine: RankingEngine,
        store: Arc<RankingStore>,
        source: Arc<dyn TrackSource>,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            collection_name: collection_name.into(),
            engine,
            store,
            source,
            locks: CollectionLocks::new(),
            max_vote_attempts: 3,
            metrics: None,
        }
    }

    pub fn with_max_vote_attempts(mut self, attempts: u32) -> Self {
        self.max_vote_attempts = attempts.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn store(&self) -> &Arc<RankingStore> {
        &self.store
    }

    /// Current snapshot, created from the track source on first use and
    /// extended with any tracks the source reports that are not ranked yet
    pub async fn fetch_rankings(&self) -> Result<RankingSnapshot> {
        let _guard = self.locks.lock(&self.collection_id).await;
        let now = current_timestamp();

        let existing = match self.store.load(&self.collection_id).await {
            Some(existing) => existing,
            None => {
                let observed = self.source.fetch_collection().await?;
                let name = if observed.collection_name.is_empty() {
                    self.collection_name.clone()
                } else {
                    observed.collection_name
                };
                let snapshot =
                    self.engine
                        .seed_snapshot(&self.collection_id, &name, observed.tracks, now);
                return match self.store.save_versioned(&snapshot, 0).await {
                    Ok(outcome) => {
                        info!(
                            "Created rankings for '{}' with {} tracks ({:?})",
                            self.collection_id,
                            snapshot.tracks.len(),
                            outcome
                        );
                        self.observe_track_count(&snapshot);
                        Ok(snapshot)
                    }
                    Err(e) if is_version_conflict(&e) => {
                        warn!(
                            "Rankings for '{}' were created by another writer: {}",
                            self.collection_id, e
                        );
                        self.record_version_conflict();
                        Ok(self.store.load(&self.collection_id).await.unwrap_or(snapshot))
                    }
                    Err(e) => Err(e),
                };
            }
        };

        let observed = match self.source.fetch_collection().await {
            Ok(observed) => observed,
            Err(e) => {
                warn!(
                    "Track source failed, serving stored rankings for '{}': {:#}",
                    self.collection_id, e
                );
                return Ok(existing);
            }
        };

        let (merged, added) = self.engine.merge_new_tracks(&existing, observed.tracks, now);
        if added == 0 {
            return Ok(existing);
        }

        match self.store.save_versioned(&merged, existing.version).await {
            Ok(outcome) => {
                info!(
                    "Added {} new tracks to '{}' ({:?})",
                    added, self.collection_id, outcome
                );
                self.observe_track_count(&merged);
                Ok(merged)
            }
            Err(e) if is_version_conflict(&e) => {
                warn!(
                    "Rankings for '{}' changed while merging new tracks: {}",
                    self.collection_id, e
                );
                self.record_version_conflict();
                Ok(self.store.load(&self.collection_id).await.unwrap_or(existing))
            }
            Err(e) => Err(e),
        }
    }

    /// Validate, apply and persist one vote, returning the updated snapshot
    pub async fn submit_vote(&self, request: VoteRequest) -> Result<RankingSnapshot> {
        let timer = MetricsTimer::start();
        let (winner_id, loser_id) = match validate_vote_request(&request) {
            Ok(ids) => ids,
            Err(e) => {
                self.record_rejection(&e);
                return Err(e);
            }
        };

        let _guard = self.locks.lock(&self.collection_id).await;

        let mut last_conflict = None;
        for attempt in 1..=self.max_vote_attempts {
            let snapshot = match self.store.load(&self.collection_id).await {
                Some(snapshot) => snapshot,
                None => {
                    let e: anyhow::Error = RankingError::SnapshotMissing {
                        collection_id: self.collection_id.clone(),
                    }
                    .into();
                    self.record_rejection(&e);
                    return Err(e);
                }
            };

            let (updated, record) =
                match self
                    .engine
                    .apply_vote(&snapshot, &winner_id, &loser_id, current_timestamp())
                {
                    Ok(result) => result,
                    Err(e) => {
                        self.record_rejection(&e);
                        return Err(e);
                    }
                };

            match self.store.save_versioned(&updated, snapshot.version).await {
                Ok(snapshot_outcome) => {
                    let log_outcome = self.store.append_vote(&self.collection_id, &record).await;
                    debug!(
                        "Vote {} persisted - snapshot: {:?}, log: {:?}",
                        record.id, snapshot_outcome, log_outcome
                    );
                    info!(
                        "Vote accepted - '{}' beat '{}' ({} -> {}), total votes: {}, time: {:.2}ms",
                        winner_id,
                        loser_id,
                        record.winner_rating_before,
                        record.winner_rating_after,
                        updated.total_votes,
                        timer.elapsed().as_secs_f64() * 1000.0
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_vote(timer.elapsed());
                    }
                    return Ok(updated);
                }
                Err(e) if is_version_conflict(&e) => {
                    warn!(
                        "Vote attempt {}/{} for '{}' hit a version conflict: {}",
                        attempt, self.max_vote_attempts, self.collection_id, e
                    );
                    self.record_version_conflict();
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let e = last_conflict.unwrap_or_else(|| {
            RankingError::InternalError {
                message: "vote was not attempted".to_string(),
            }
            .into()
        });
        self.record_rejection(&e);
        Err(e)
    }

    /// Analytics over the collection's full vote log
    pub async fn vote_analytics(&self) -> Result<VoteAnalytics> {
        let votes = self.store.load_vote_history(&self.collection_id).await;
        Ok(compute_analytics(&votes, current_timestamp()))
    }

    /// Two tracks to compare next
    pub async fn next_matchup(&self) -> Result<Matchup> {
        let snapshot = self.fetch_rankings().await?;
        let mut rng = rand::rng();
        select_matchup(&snapshot, &mut rng)
    }

    fn observe_track_count(&self, snapshot: &RankingSnapshot) {
        if let Some(metrics) = &self.metrics {
            metrics.update_track_count(snapshot.tracks.len());
        }
    }

    fn record_version_conflict(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_version_conflict();
        }
    }

    fn record_rejection(&self, error: &anyhow::Error) {
        let reason = match RankingError::classify(error) {
            Some(RankingError::InvalidVote { .. }) => "invalid_vote",
            Some(RankingError::TrackNotFound { .. }) => "track_not_found",
            Some(RankingError::SnapshotMissing { .. }) => "snapshot_missing",
            Some(RankingError::VersionConflict { .. }) => "version_conflict",
            _ => "other",
        };
        debug!("Vote rejected ({}): {}", reason, error);
        if let Some(metrics) = &self.metrics {
            metrics.record_rejected_vote(reason);
        }
    }
}

fn is_version_conflict(error: &anyhow::Error) -> bool {
    matches!(
        RankingError::classify(error),
        Some(RankingError::VersionConflict { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticTrackSource;
    use crate::types::{ObservedCollection, ObservedTrack};
    use tokio_test::{assert_err, assert_ok};

    fn track(id: &str) -> ObservedTrack {
        ObservedTrack {
            id: id.to_string(),
            name: format!("Song {}", id),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            image_url: None,
            preview_url: None,
            external_url: None,
            duration_ms: None,
        }
    }

    fn service(ids: &[&str]) -> RankingService {
        let source = StaticTrackSource::new(ObservedCollection {
            collection_id: "mix".to_string(),
            collection_name: "Mix".to_string(),
            tracks: ids.iter().map(|id| track(id)).collect(),
        });
        RankingService::new(
            "mix",
            "Mix",
            RankingEngine::default(),
            Arc::new(RankingStore::in_memory()),
            Arc::new(source),
        )
    }

    fn vote(winner: &str, loser: &str) -> VoteRequest {
        VoteRequest {
            winner_id: Some(winner.to_string()),
            loser_id: Some(loser.to_string()),
        }
    }

    #[test]
    fn test_validate_vote_request() {
        let (winner, loser) = assert_ok!(validate_vote_request(&vote(" a ", "b")));
        assert_eq!((winner.as_str(), loser.as_str()), ("a", "b"));

        assert_err!(validate_vote_request(&vote("a", "a")));
        assert_err!(validate_vote_request(&vote(" ", "b")));
        assert_err!(validate_vote_request(&VoteRequest {
            winner_id: Some("a".to_string()),
            loser_id: None,
        }));
        assert_err!(validate_vote_request(&VoteRequest::default()));
    }

    #[tokio::test]
    async fn test_vote_before_rankings_exist() {
        let service = service(&["a", "b"]);
        let err = service.submit_vote(vote("a", "b")).await.unwrap_err();
        assert!(matches!(
            RankingError::classify(&err),
            Some(RankingError::SnapshotMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_then_vote() {
        let service = service(&["a", "b", "c"]);
        let seeded = service.fetch_rankings().await.unwrap();
        assert_eq!(seeded.tracks.len(), 3);
        assert_eq!(seeded.collection_name, "Mix");

        let updated = service.submit_vote(vote("c", "a")).await.unwrap();
        assert_eq!(updated.total_votes, 1);
        assert_eq!(updated.track("c").unwrap().rating, 1516.0);

        let history = service.store().load_vote_history("mix").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].winner_id, "c");
    }

    #[tokio::test]
    async fn test_rejected_vote_changes_nothing() {
        let service = service(&["a", "b"]);
        let seeded = service.fetch_rankings().await.unwrap();

        assert!(service.submit_vote(vote("a", "a")).await.is_err());
        assert!(service.submit_vote(vote("a", "zzz")).await.is_err());

        assert_eq!(service.store().load("mix").await, Some(seeded));
        assert!(service.store().load_vote_history("mix").await.is_empty());
    }

    #[tokio::test]
    async fn test_matchup_after_fetch() {
        let service = service(&["a", "b", "c"]);
        let matchup = service.next_matchup().await.unwrap();
        assert_ne!(matchup.a.id, matchup.b.id);
    }

    #[tokio::test]
    async fn test_collection_locks_are_per_collection() {
        let locks = CollectionLocks::new();
        let _held = locks.lock("a").await;
        // A different collection is not blocked by the held lock
        let other = tokio::time::timeout(std::time::Duration::from_millis(100), locks.lock("b")).await;
        assert!(other.is_ok());
        let same = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock("a")).await;
        assert!(same.is_err());
    }
}
