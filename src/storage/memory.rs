//! In-process memory backend
//!
//! The last tier of every store. It never reports a failure other than a
//! poisoned lock, and its contents live as long as the store instance.

use crate::error::{RankingError, Result};
use crate::storage::backend::StorageBackend;
use crate::types::{CollectionId, RankingSnapshot, VoteRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

pub const MEMORY_BACKEND_NAME: &str = "memory";

/// In-memory snapshot and vote log storage
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshots: RwLock<HashMap<CollectionId, RankingSnapshot>>,
    votes: RwLock<HashMap<CollectionId, Vec<VoteRecord>>>,
}

fn lock_error(what: &str) -> anyhow::Error {
    RankingError::InternalError {
        message: format!("Failed to acquire {} lock", what),
    }
    .into()
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collections with a snapshot held in memory
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        MEMORY_BACKEND_NAME
    }

    async fn load_snapshot(&self, collection_id: &str) -> Result<Option<RankingSnapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| lock_error("snapshots read"))?;
        Ok(snapshots.get(collection_id).cloned())
    }

    async fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| lock_error("snapshots write"))?;
        snapshots.insert(snapshot.collection_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load_votes(&self, collection_id: &str) -> Result<Option<Vec<VoteRecord>>> {
        let votes = self.votes.read().map_err(|_| lock_error("votes read"))?;
        Ok(votes.get(collection_id).cloned())
    }

    async fn store_votes(&self, collection_id: &str, records: &[VoteRecord]) -> Result<()> {
        let mut votes = self.votes.write().map_err(|_| lock_error("votes write"))?;
        votes.insert(collection_id.to_string(), records.to_vec());
        Ok(())
    }

    async fn append_vote(&self, collection_id: &str, record: &VoteRecord) -> Result<()> {
        let mut votes = self.votes.write().map_err(|_| lock_error("votes write"))?;
        votes
            .entry(collection_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}
