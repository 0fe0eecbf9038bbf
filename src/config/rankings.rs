//! Ranking collection configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingsSettings {
    /// Collection (playlist) ranked by this service
    pub collection_id: String,
    pub collection_name: String,
    /// JSON export of the collection's tracks
    pub tracks_file: Option<PathBuf>,
    /// Attempts per vote when the snapshot changed underneath us
    pub max_vote_attempts: u32,
}

impl Default for RankingsSettings {
    fn default() -> Self {
        Self {
            collection_id: "tunes".to_string(),
            collection_name: "Tunes".to_string(),
            tracks_file: None,
            max_vote_attempts: 3,
        }
    }
}
