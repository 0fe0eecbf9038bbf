//! Storage backend interface
//!
//! Every storage tier implements [`StorageBackend`]. Tiers that only know how
//! to get and set string values implement [`KeyValueStore`] instead and are
//! adapted through [`KeyValueBackend`], which owns key naming and JSON
//! encoding.

use crate::error::Result;
use crate::types::{RankingSnapshot, VoteRecord};
use async_trait::async_trait;

/// Trait for snapshot and vote log persistence
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs, metrics and save outcomes
    fn name(&self) -> &str;

    /// Get the snapshot of a collection, `None` if this backend has none
    async fn load_snapshot(&self, collection_id: &str) -> Result<Option<RankingSnapshot>>;

    /// Overwrite the snapshot of `snapshot.collection_id`
    async fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<()>;

    /// Get the vote log of a collection, `None` if this backend has none
    async fn load_votes(&self, collection_id: &str) -> Result<Option<Vec<VoteRecord>>>;

    /// Overwrite the full vote log of a collection
    async fn store_votes(&self, collection_id: &str, votes: &[VoteRecord]) -> Result<()>;

    /// Append one record to the vote log.
    ///
    /// The default is a read-modify-write of the whole log; callers must
    /// serialize appends.
    async fn append_vote(&self, collection_id: &str, record: &VoteRecord) -> Result<()> {
        let mut votes = self.load_votes(collection_id).await?.unwrap_or_default();
        votes.push(record.clone());
        self.store_votes(collection_id, &votes).await
    }
}

/// Raw string key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Key naming shared by all key-value tiers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageKeys {
    prefix: String,
}

impl StorageKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn snapshot(&self, collection_id: &str) -> String {
        format!("{}rankings:{}", self.prefix, collection_id)
    }

    pub fn votes(&self, collection_id: &str) -> String {
        format!("{}votes:{}", self.prefix, collection_id)
    }
}

/// Adapts a [`KeyValueStore`] into a [`StorageBackend`] storing JSON documents
#[derive(Debug, Clone)]
pub struct KeyValueBackend<S> {
    store: S,
    keys: StorageKeys,
}

impl<S: KeyValueStore> KeyValueBackend<S> {
    pub fn new(store: S, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: KeyValueStore> StorageBackend for KeyValueBackend<S> {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn load_snapshot(&self, collection_id: &str) -> Result<Option<RankingSnapshot>> {
        match self.store.get(&self.keys.snapshot(collection_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<()> {
        let raw = serde_json::to_string(snapshot)?;
        self.store
            .set(&self.keys.snapshot(&snapshot.collection_id), &raw)
            .await
    }

    async fn load_votes(&self, collection_id: &str) -> Result<Option<Vec<VoteRecord>>> {
        match self.store.get(&self.keys.votes(collection_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn store_votes(&self, collection_id: &str, votes: &[VoteRecord]) -> Result<()> {
        let raw = serde_json::to_string(votes)?;
        self.store.set(&self.keys.votes(collection_id), &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys() {
        let keys = StorageKeys::new("tunes:");
        assert_eq!(keys.snapshot("abc"), "tunes:rankings:abc");
        assert_eq!(keys.votes("abc"), "tunes:votes:abc");

        let bare = StorageKeys::default();
        assert_eq!(bare.snapshot("abc"), "rankings:abc");
    }
}
