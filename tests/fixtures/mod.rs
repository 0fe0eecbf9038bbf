//! Test fixtures and storage doubles for integration testing

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tunes_rankings::error::Result;
use tunes_rankings::rating::RankingEngine;
use tunes_rankings::source::StaticTrackSource;
use tunes_rankings::storage::{RankingStore, StorageBackend};
use tunes_rankings::types::{ObservedCollection, ObservedTrack, RankingSnapshot, VoteRecord};
use tunes_rankings::RankingService;

pub const COLLECTION_ID: &str = "road-trip";

/// Backend whose every call fails, standing in for an unreachable store
#[derive(Debug, Default)]
pub struct FailingBackend {
    name: String,
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("{} is unreachable", self.name))
    }
}

#[async_trait]
impl StorageBackend for FailingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_snapshot(&self, _collection_id: &str) -> Result<Option<RankingSnapshot>> {
        self.fail()
    }

    async fn save_snapshot(&self, _snapshot: &RankingSnapshot) -> Result<()> {
        self.fail()
    }

    async fn load_votes(&self, _collection_id: &str) -> Result<Option<Vec<VoteRecord>>> {
        self.fail()
    }

    async fn store_votes(&self, _collection_id: &str, _votes: &[VoteRecord]) -> Result<()> {
        self.fail()
    }
}

/// Working in-process backend that counts writes and can add latency
#[derive(Debug, Default)]
pub struct RecordingBackend {
    snapshots: Mutex<HashMap<String, RankingSnapshot>>,
    votes: Mutex<HashMap<String, Vec<VoteRecord>>>,
    snapshot_writes: AtomicUsize,
    latency: Option<Duration>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the runtime inside every call, widening race windows
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn snapshot_writes(&self) -> usize {
        self.snapshot_writes.load(Ordering::SeqCst)
    }

    pub fn stored_snapshot(&self, collection_id: &str) -> Option<RankingSnapshot> {
        self.snapshots.lock().unwrap().get(collection_id).cloned()
    }

    pub fn stored_votes(&self, collection_id: &str) -> Vec<VoteRecord> {
        self.votes
            .lock()
            .unwrap()
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn pause(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn load_snapshot(&self, collection_id: &str) -> Result<Option<RankingSnapshot>> {
        self.pause().await;
        Ok(self.stored_snapshot(collection_id))
    }

    async fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<()> {
        self.pause().await;
        self.snapshot_writes.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.collection_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load_votes(&self, collection_id: &str) -> Result<Option<Vec<VoteRecord>>> {
        self.pause().await;
        Ok(self.votes.lock().unwrap().get(collection_id).cloned())
    }

    async fn store_votes(&self, collection_id: &str, votes: &[VoteRecord]) -> Result<()> {
        self.pause().await;
        self.votes
            .lock()
            .unwrap()
            .insert(collection_id.to_string(), votes.to_vec());
        Ok(())
    }
}

pub fn observed_track(id: &str) -> ObservedTrack {
    ObservedTrack {
        id: id.to_string(),
        name: format!("Track {}", id),
        artist: "The Testers".to_string(),
        album: "Fixtures".to_string(),
        image_url: None,
        preview_url: Some(format!("https://audio.example.com/{}.mp3", id)),
        external_url: None,
        duration_ms: Some(180_000),
    }
}

pub fn collection(ids: &[&str]) -> ObservedCollection {
    ObservedCollection {
        collection_id: COLLECTION_ID.to_string(),
        collection_name: "Road Trip".to_string(),
        tracks: ids.iter().map(|id| observed_track(id)).collect(),
    }
}

/// Service over `store` whose source always reports `ids`
pub fn service_with_store(ids: &[&str], store: Arc<RankingStore>) -> RankingService {
    RankingService::new(
        COLLECTION_ID,
        "Road Trip",
        RankingEngine::default(),
        store,
        Arc::new(StaticTrackSource::new(collection(ids))),
    )
}

pub fn memory_service(ids: &[&str]) -> RankingService {
    service_with_store(ids, Arc::new(RankingStore::in_memory()))
}
