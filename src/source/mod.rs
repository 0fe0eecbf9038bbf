//! Track sources
//!
//! A track source reports which tracks currently belong to the ranked
//! collection. Only the shape of that data matters to the rankings; where it
//! comes from (a playlist export, a fixed list) is up to the implementation.

use crate::error::{RankingError, Result};
use crate::types::{ObservedCollection, ObservedTrack};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// Trait for fetching the currently observed collection
#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn fetch_collection(&self) -> Result<ObservedCollection>;
}

/// Source returning a fixed collection
#[derive(Debug, Clone)]
pub struct StaticTrackSource {
    collection: ObservedCollection,
}

impl StaticTrackSource {
    pub fn new(collection: ObservedCollection) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl TrackSource for StaticTrackSource {
    async fn fetch_collection(&self) -> Result<ObservedCollection> {
        Ok(self.collection.clone())
    }
}

/// Playlist export: either a full collection document or a bare track list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackFile {
    Collection(ObservedCollection),
    Tracks(Vec<ObservedTrack>),
}

/// Source reading a JSON export of the collection from disk on every fetch
#[derive(Debug, Clone)]
pub struct JsonFileTrackSource {
    path: PathBuf,
    collection_id: String,
    collection_name: String,
}

impl JsonFileTrackSource {
    /// `collection_id`/`collection_name` apply to bare track lists; a full
    /// collection document overrides the name but keeps the configured id.
    pub fn new(
        path: impl Into<PathBuf>,
        collection_id: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            collection_id: collection_id.into(),
            collection_name: collection_name.into(),
        }
    }
}

#[async_trait]
impl TrackSource for JsonFileTrackSource {
    async fn fetch_collection(&self) -> Result<ObservedCollection> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RankingError::SourceUnavailable {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            }
        })?;

        let parsed: TrackFile =
            serde_json::from_str(&raw).map_err(|e| RankingError::SourceUnavailable {
                message: format!("Failed to parse {}: {}", self.path.display(), e),
            })?;

        let collection = match parsed {
            TrackFile::Collection(collection) => ObservedCollection {
                collection_id: self.collection_id.clone(),
                collection_name: collection.collection_name,
                tracks: collection.tracks,
            },
            TrackFile::Tracks(tracks) => ObservedCollection {
                collection_id: self.collection_id.clone(),
                collection_name: self.collection_name.clone(),
                tracks,
            },
        };

        debug!(
            "Read {} tracks for collection '{}' from {}",
            collection.tracks.len(),
            collection.collection_id,
            self.path.display()
        );
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bare_track_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "1", "name": "One", "artist": "A", "album": "X", "durationMs": 1000},
                {"id": "2", "name": "Two", "artist": "B"}
            ]"#,
        )
        .unwrap();

        let source = JsonFileTrackSource::new(&path, "mix", "Mix");
        let collection = source.fetch_collection().await.unwrap();

        assert_eq!(collection.collection_id, "mix");
        assert_eq!(collection.collection_name, "Mix");
        assert_eq!(collection.tracks.len(), 2);
        assert_eq!(collection.tracks[0].duration_ms, Some(1000));
        assert_eq!(collection.tracks[1].album, "");
    }

    #[tokio::test]
    async fn test_collection_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.json");
        std::fs::write(
            &path,
            r#"{
                "collectionId": "ignored",
                "collectionName": "Road Trip",
                "tracks": [{"id": "1", "name": "One", "artist": "A"}]
            }"#,
        )
        .unwrap();

        let collection = JsonFileTrackSource::new(&path, "mix", "Mix")
            .fetch_collection()
            .await
            .unwrap();

        assert_eq!(collection.collection_id, "mix");
        assert_eq!(collection.collection_name, "Road Trip");
        assert_eq!(collection.tracks.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let source = JsonFileTrackSource::new("/nonexistent/tracks.json", "mix", "Mix");
        let err = source.fetch_collection().await.unwrap_err();
        assert!(matches!(
            RankingError::classify(&err),
            Some(RankingError::SourceUnavailable { .. })
        ));
    }
}
