//! Local filesystem key-value store
//!
//! Each key is one JSON file in the data directory. Writes go to a temporary
//! file first and are renamed into place, so readers never see a torn file.

use crate::error::Result;
use crate::storage::backend::KeyValueStore;
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FILE_BACKEND_NAME: &str = "filesystem";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`; characters outside `[A-Za-z0-9._-]` become `_`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        FILE_BACKEND_NAME
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, value)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}
