//! Storage backend configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for a Redis-style REST key-value service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteKvSettings {
    /// REST endpoint base URL
    pub url: String,
    /// Bearer token
    pub token: String,
}

/// Storage tiers, tried in order: primary KV, secondary KV, data dir, memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub primary_kv: Option<RemoteKvSettings>,
    pub secondary_kv: Option<RemoteKvSettings>,
    /// Directory for the filesystem backend
    pub data_dir: Option<PathBuf>,
    /// Prefix for every storage key
    pub key_prefix: String,
    /// Per-attempt timeout in milliseconds
    pub backend_timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            primary_kv: None,
            secondary_kv: None,
            data_dir: None,
            key_prefix: "tunes:".to_string(),
            backend_timeout_ms: 2000,
        }
    }
}

impl StorageSettings {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}
