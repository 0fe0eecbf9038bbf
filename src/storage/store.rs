//! Ranking store with prioritized backend fallback
//!
//! Durable backends are tried in the order they were configured, followed by
//! the in-process memory backend. Attempts are sequential and each one is
//! bounded by the backend timeout; a failing or slow backend is skipped for
//! that call only.
//!
//! Writes always land in memory first. Durable writes then stop at the first
//! backend that accepts them, so exactly one durable copy is refreshed per
//! save.

use crate::config::StorageSettings;
use crate::error::{RankingError, Result};
use crate::metrics::MetricsCollector;
use crate::storage::backend::{KeyValueBackend, StorageBackend, StorageKeys};
use crate::storage::file::FileStore;
use crate::storage::memory::{MemoryBackend, MEMORY_BACKEND_NAME};
use crate::storage::remote::RestKvStore;
use crate::types::{RankingSnapshot, VoteRecord};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Where a write ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Persisted by the named durable backend
    Durable { backend: String },
    /// Only the in-memory copy was updated
    MemoryOnly,
}

impl SaveOutcome {
    pub fn is_durable(&self) -> bool {
        matches!(self, SaveOutcome::Durable { .. })
    }

    fn label(&self) -> &str {
        match self {
            SaveOutcome::Durable { .. } => "durable",
            SaveOutcome::MemoryOnly => "memory_only",
        }
    }
}

/// Point-in-time view of the store for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub backends: Vec<String>,
    pub last_save: Option<SaveOutcome>,
    pub degraded_saves: u64,
    pub backend_failures: u64,
}

/// Snapshot and vote log persistence across all configured tiers
pub struct RankingStore {
    durable: Vec<Arc<dyn StorageBackend>>,
    memory: Arc<MemoryBackend>,
    backend_timeout: Duration,
    append_lock: Mutex<()>,
    last_save: RwLock<Option<SaveOutcome>>,
    degraded_saves: AtomicU64,
    backend_failures: AtomicU64,
    metrics: Option<Arc<MetricsCollector>>,
}

impl std::fmt::Debug for RankingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingStore")
            .field("backends", &self.backend_names())
            .field("backend_timeout", &self.backend_timeout)
            .finish()
    }
}

impl RankingStore {
    /// Create a store over `durable` backends, highest priority first
    pub fn new(durable: Vec<Arc<dyn StorageBackend>>, backend_timeout: Duration) -> Self {
        Self {
            durable,
            memory: Arc::new(MemoryBackend::new()),
            backend_timeout,
            append_lock: Mutex::new(()),
            last_save: RwLock::new(None),
            degraded_saves: AtomicU64::new(0),
            backend_failures: AtomicU64::new(0),
            metrics: None,
        }
    }

    /// Memory-only store
    pub fn in_memory() -> Self {
        Self::new(Vec::new(), DEFAULT_BACKEND_TIMEOUT)
    }

    /// Build the backend chain from validated settings
    pub fn from_settings(settings: &StorageSettings) -> Result<Self> {
        let keys = StorageKeys::new(settings.key_prefix.clone());
        let mut durable: Vec<Arc<dyn StorageBackend>> = Vec::new();

        if let Some(primary) = &settings.primary_kv {
            let store = RestKvStore::new("primary_kv", primary)?;
            durable.push(Arc::new(KeyValueBackend::new(store, keys.clone())));
        }
        if let Some(secondary) = &settings.secondary_kv {
            let store = RestKvStore::new("secondary_kv", secondary)?;
            durable.push(Arc::new(KeyValueBackend::new(store, keys.clone())));
        }
        if let Some(dir) = &settings.data_dir {
            durable.push(Arc::new(KeyValueBackend::new(FileStore::new(dir.clone()), keys)));
        }

        let store = Self::new(durable, settings.backend_timeout());
        info!("Ranking store backends: {}", store.backend_names().join(" -> "));
        Ok(store)
    }

    /// Attach a metrics collector for backend failure and save counters
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Names of all tiers in priority order, memory last
    pub fn backend_names(&self) -> Vec<String> {
        self.durable
            .iter()
            .map(|backend| backend.name().to_string())
            .chain(std::iter::once(MEMORY_BACKEND_NAME.to_string()))
            .collect()
    }

    pub fn has_durable_backends(&self) -> bool {
        !self.durable.is_empty()
    }

    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            backends: self.backend_names(),
            last_save: self.last_save.read().ok().and_then(|last| last.clone()),
            degraded_saves: self.degraded_saves.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
        }
    }

    /// Run one backend call under the timeout; failures become `None`
    async fn attempt<T, F>(&self, backend: &str, operation: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        let failure = match tokio::time::timeout(self.backend_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => format!("{:#}", e),
            Err(_) => format!("timed out after {:?}", self.backend_timeout),
        };

        warn!(
            "Storage backend '{}' failed during {}: {}",
            backend, operation, failure
        );
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_backend_failure(backend, operation);
        }
        None
    }

    fn record_save(&self, outcome: &SaveOutcome) {
        if !outcome.is_durable() && self.has_durable_backends() {
            self.degraded_saves.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut last) = self.last_save.write() {
            *last = Some(outcome.clone());
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_save(outcome.label());
        }
    }

    /// Load a collection's snapshot from the highest-priority tier that answers.
    ///
    /// A reachable tier without the key ends the search; only failures and
    /// timeouts fall through to the next tier.
    pub async fn load(&self, collection_id: &str) -> Option<RankingSnapshot> {
        for backend in &self.durable {
            if let Some(answer) = self
                .attempt(
                    backend.name(),
                    "load_snapshot",
                    backend.load_snapshot(collection_id),
                )
                .await
            {
                debug!(
                    "Loaded snapshot '{}' from {}: {}",
                    collection_id,
                    backend.name(),
                    answer
                        .as_ref()
                        .map_or_else(|| "absent".to_string(), |s| format!("v{}", s.version))
                );
                return answer;
            }
        }

        self.attempt(
            MEMORY_BACKEND_NAME,
            "load_snapshot",
            self.memory.load_snapshot(collection_id),
        )
        .await
        .flatten()
    }

    /// Persist a snapshot: memory first, then the first durable tier that accepts it
    pub async fn save(&self, snapshot: &RankingSnapshot) -> SaveOutcome {
        self.attempt(
            MEMORY_BACKEND_NAME,
            "save_snapshot",
            self.memory.save_snapshot(snapshot),
        )
        .await;

        let mut outcome = SaveOutcome::MemoryOnly;
        for backend in &self.durable {
            if self
                .attempt(backend.name(), "save_snapshot", backend.save_snapshot(snapshot))
                .await
                .is_some()
            {
                outcome = SaveOutcome::Durable {
                    backend: backend.name().to_string(),
                };
                break;
            }
        }

        if !outcome.is_durable() && self.has_durable_backends() {
            warn!(
                "Snapshot '{}' v{} kept in memory only",
                snapshot.collection_id, snapshot.version
            );
        }
        self.record_save(&outcome);
        outcome
    }

    /// Compare-and-save: persist only if the stored version still equals
    /// `expected_version`. A missing snapshot counts as version 0.
    pub async fn save_versioned(
        &self,
        snapshot: &RankingSnapshot,
        expected_version: u64,
    ) -> Result<SaveOutcome> {
        let found = self
            .load(&snapshot.collection_id)
            .await
            .map(|current| current.version)
            .unwrap_or(0);

        if found != expected_version {
            return Err(RankingError::VersionConflict {
                expected: expected_version,
                found,
            }
            .into());
        }

        Ok(self.save(snapshot).await)
    }

    /// Append a vote record: memory log first, then the first durable tier
    /// that accepts it
    pub async fn append_vote(&self, collection_id: &str, record: &VoteRecord) -> SaveOutcome {
        let _guard = self.append_lock.lock().await;

        self.attempt(
            MEMORY_BACKEND_NAME,
            "append_vote",
            self.memory.append_vote(collection_id, record),
        )
        .await;

        let mut outcome = SaveOutcome::MemoryOnly;
        for backend in &self.durable {
            if self
                .attempt(
                    backend.name(),
                    "append_vote",
                    backend.append_vote(collection_id, record),
                )
                .await
                .is_some()
            {
                outcome = SaveOutcome::Durable {
                    backend: backend.name().to_string(),
                };
                break;
            }
        }

        self.record_save(&outcome);
        outcome
    }

    /// Load the vote log from the highest-priority tier that answers
    pub async fn load_vote_history(&self, collection_id: &str) -> Vec<VoteRecord> {
        for backend in &self.durable {
            if let Some(answer) = self
                .attempt(backend.name(), "load_votes", backend.load_votes(collection_id))
                .await
            {
                return answer.unwrap_or_default();
            }
        }

        self.attempt(
            MEMORY_BACKEND_NAME,
            "load_votes",
            self.memory.load_votes(collection_id),
        )
        .await
        .flatten()
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::RankingEngine;
    use crate::types::ObservedTrack;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    /// Backend that fails every call
    struct BrokenBackend;

    #[async_trait]
    impl StorageBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        async fn load_snapshot(&self, _: &str) -> Result<Option<RankingSnapshot>> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn save_snapshot(&self, _: &RankingSnapshot) -> Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn load_votes(&self, _: &str) -> Result<Option<Vec<VoteRecord>>> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn store_votes(&self, _: &str, _: &[VoteRecord]) -> Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    /// Backend that never answers
    struct HangingBackend;

    #[async_trait]
    impl StorageBackend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn load_snapshot(&self, _: &str) -> Result<Option<RankingSnapshot>> {
            std::future::pending().await
        }

        async fn save_snapshot(&self, _: &RankingSnapshot) -> Result<()> {
            std::future::pending().await
        }

        async fn load_votes(&self, _: &str) -> Result<Option<Vec<VoteRecord>>> {
            std::future::pending().await
        }

        async fn store_votes(&self, _: &str, _: &[VoteRecord]) -> Result<()> {
            std::future::pending().await
        }
    }

    /// Memory-backed durable tier that counts writes
    #[derive(Default)]
    struct CountingBackend {
        inner: MemoryBackend,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl StorageBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        async fn load_snapshot(&self, id: &str) -> Result<Option<RankingSnapshot>> {
            self.inner.load_snapshot(id).await
        }

        async fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_snapshot(snapshot).await
        }

        async fn load_votes(&self, id: &str) -> Result<Option<Vec<VoteRecord>>> {
            self.inner.load_votes(id).await
        }

        async fn store_votes(&self, id: &str, votes: &[VoteRecord]) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.store_votes(id, votes).await
        }
    }

    fn snapshot() -> RankingSnapshot {
        let tracks = ["a", "b", "c"]
            .iter()
            .map(|id| ObservedTrack {
                id: id.to_string(),
                name: id.to_string(),
                artist: "Artist".to_string(),
                album: String::new(),
                image_url: None,
                preview_url: None,
                external_url: None,
                duration_ms: None,
            })
            .collect();
        RankingEngine::default().seed_snapshot("mix", "Mix", tracks, Utc::now())
    }

    #[tokio::test]
    async fn test_memory_only_store_round_trip() {
        let store = RankingStore::in_memory();
        assert!(store.load("mix").await.is_none());

        let snapshot = snapshot();
        assert_eq!(store.save(&snapshot).await, SaveOutcome::MemoryOnly);
        assert_eq!(store.load("mix").await, Some(snapshot));
        // No durable tier configured, so memory-only is not a degradation
        assert_eq!(store.status().degraded_saves, 0);
    }

    #[tokio::test]
    async fn test_failing_backends_fall_back_to_memory() {
        let store = RankingStore::new(
            vec![Arc::new(BrokenBackend), Arc::new(BrokenBackend)],
            Duration::from_millis(200),
        );

        let snapshot = snapshot();
        let outcome = store.save(&snapshot).await;
        assert_eq!(outcome, SaveOutcome::MemoryOnly);
        assert_eq!(store.load("mix").await, Some(snapshot));

        let status = store.status();
        assert_eq!(status.degraded_saves, 1);
        assert_eq!(status.backend_failures, 4);
        assert_eq!(status.last_save, Some(SaveOutcome::MemoryOnly));
    }

    #[tokio::test]
    async fn test_save_stops_at_first_durable_success() {
        let first = Arc::new(CountingBackend::default());
        let second = Arc::new(CountingBackend::default());
        let store = RankingStore::new(
            vec![
                Arc::new(BrokenBackend),
                first.clone(),
                second.clone(),
            ],
            Duration::from_millis(200),
        );

        let outcome = store.save(&snapshot()).await;
        assert_eq!(
            outcome,
            SaveOutcome::Durable {
                backend: "counting".to_string()
            }
        );
        assert_eq!(first.saves.load(Ordering::SeqCst), 1);
        assert_eq!(second.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_backend_times_out() {
        let durable = Arc::new(CountingBackend::default());
        let store = RankingStore::new(
            vec![Arc::new(HangingBackend), durable.clone()],
            Duration::from_secs(2),
        );

        let snapshot = snapshot();
        assert!(store.save(&snapshot).await.is_durable());
        assert_eq!(store.load("mix").await, Some(snapshot));
        assert_eq!(store.status().backend_failures, 2);
    }

    #[tokio::test]
    async fn test_load_prefers_higher_priority_backend() {
        let high = Arc::new(CountingBackend::default());
        let low = Arc::new(CountingBackend::default());
        let store = RankingStore::new(vec![high.clone(), low.clone()], DEFAULT_BACKEND_TIMEOUT);

        let mut older = snapshot();
        older.collection_name = "Older".to_string();
        let newer = snapshot();
        low.inner.save_snapshot(&older).await.unwrap();
        high.inner.save_snapshot(&newer).await.unwrap();

        assert_eq!(store.load("mix").await.unwrap().collection_name, "Mix");
    }

    #[tokio::test]
    async fn test_empty_reachable_backend_hides_lower_tiers() {
        let high = Arc::new(CountingBackend::default());
        let low = Arc::new(CountingBackend::default());
        let store = RankingStore::new(vec![high.clone(), low.clone()], DEFAULT_BACKEND_TIMEOUT);

        low.inner.save_snapshot(&snapshot()).await.unwrap();
        let (_, record) = RankingEngine::default()
            .apply_vote(&snapshot(), "a", "b", Utc::now())
            .unwrap();
        low.inner.append_vote("mix", &record).await.unwrap();

        assert_eq!(store.load("mix").await, None);
        assert!(store.load_vote_history("mix").await.is_empty());
        assert_eq!(store.status().backend_failures, 0);
    }

    #[tokio::test]
    async fn test_failed_backend_falls_through_to_lower_tier() {
        let low = Arc::new(CountingBackend::default());
        let store = RankingStore::new(
            vec![Arc::new(BrokenBackend), low.clone()],
            DEFAULT_BACKEND_TIMEOUT,
        );

        let snapshot = snapshot();
        low.inner.save_snapshot(&snapshot).await.unwrap();
        assert_eq!(store.load("mix").await, Some(snapshot));
    }

    #[tokio::test]
    async fn test_save_versioned_rejects_stale_base() {
        let store = RankingStore::in_memory();
        let engine = RankingEngine::default();

        let seeded = snapshot();
        store.save_versioned(&seeded, 0).await.unwrap();

        let (first, _) = engine.apply_vote(&seeded, "a", "b", Utc::now()).unwrap();
        let (second, _) = engine.apply_vote(&seeded, "c", "b", Utc::now()).unwrap();

        store.save_versioned(&first, seeded.version).await.unwrap();
        let err = store
            .save_versioned(&second, seeded.version)
            .await
            .unwrap_err();
        match RankingError::classify(&err) {
            Some(RankingError::VersionConflict { expected, found }) => {
                assert_eq!(*expected, 0);
                assert_eq!(*found, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.load("mix").await, Some(first));
    }

    #[tokio::test]
    async fn test_vote_log_fallback() {
        let store = RankingStore::new(vec![Arc::new(BrokenBackend)], DEFAULT_BACKEND_TIMEOUT);
        assert!(store.load_vote_history("mix").await.is_empty());

        let (_, record) = RankingEngine::default()
            .apply_vote(&snapshot(), "a", "b", Utc::now())
            .unwrap();
        assert_eq!(
            store.append_vote("mix", &record).await,
            SaveOutcome::MemoryOnly
        );
        assert_eq!(store.load_vote_history("mix").await, vec![record]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_record() {
        let durable = Arc::new(CountingBackend::default());
        let store = Arc::new(RankingStore::new(
            vec![durable.clone()],
            DEFAULT_BACKEND_TIMEOUT,
        ));
        let base = snapshot();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            let base = base.clone();
            handles.push(tokio::spawn(async move {
                let (_, record) = RankingEngine::default()
                    .apply_vote(&base, "a", "b", Utc::now())
                    .unwrap();
                store.append_vote("mix", &record).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_durable());
        }

        assert_eq!(store.load_vote_history("mix").await.len(), 25);
        assert_eq!(
            durable.inner.load_votes("mix").await.unwrap().unwrap().len(),
            25
        );
    }
}
