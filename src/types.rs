//! Common types used throughout the rankings service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable external identifier of a track
pub type TrackId = String;

/// Identifier of the collection (playlist) a snapshot ranks
pub type CollectionId = String;

/// Unique identifier for vote records
pub type VoteId = Uuid;

/// Rating every track starts from
pub const INITIAL_RATING: f64 = 1500.0;

/// Rank recorded before a track has been ranked among its peers.
/// This is a sentinel, never a real position.
pub const UNRANKED: u32 = 0;

/// One rank-history checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingCheckpoint {
    pub timestamp: DateTime<Utc>,
    pub rating: f64,
    pub rank: u32,
}

/// Display metadata of a track as reported by a track source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedTrack {
    pub id: TrackId,
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// The collection a track source currently observes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedCollection {
    pub collection_id: CollectionId,
    pub collection_name: String,
    pub tracks: Vec<ObservedTrack>,
}

/// A ranked track with its persistent rating state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    pub comparisons: u32,
    pub last_updated: DateTime<Utc>,
    pub rating_history: Vec<RatingCheckpoint>,
}

impl Track {
    /// Create a freshly seeded track from observed metadata
    pub fn seeded(observed: ObservedTrack, now: DateTime<Utc>) -> Self {
        Self {
            id: observed.id,
            name: observed.name,
            artist: observed.artist,
            album: observed.album,
            image_url: observed.image_url,
            preview_url: observed.preview_url,
            external_url: observed.external_url,
            duration_ms: observed.duration_ms,
            rating: INITIAL_RATING,
            wins: 0,
            losses: 0,
            comparisons: 0,
            last_updated: now,
            rating_history: vec![RatingCheckpoint {
                timestamp: now,
                rating: INITIAL_RATING,
                rank: UNRANKED,
            }],
        }
    }

    /// Fraction of comparisons won, 0.0 when never compared
    pub fn win_rate(&self) -> f64 {
        if self.comparisons == 0 {
            0.0
        } else {
            self.wins as f64 / self.comparisons as f64
        }
    }

    /// Most recent rank-history checkpoint
    pub fn last_checkpoint(&self) -> Option<&RatingCheckpoint> {
        self.rating_history.last()
    }
}

/// Complete ranking state of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSnapshot {
    pub collection_id: CollectionId,
    pub collection_name: String,
    pub last_updated: DateTime<Utc>,
    pub total_votes: u64,
    /// Optimistic-concurrency stamp, bumped on every mutation
    #[serde(default)]
    pub version: u64,
    pub tracks: Vec<Track>,
}

impl RankingSnapshot {
    pub fn track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == track_id)
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.track(track_id).is_some()
    }
}

/// Immutable audit entry for one accepted vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub id: VoteId,
    pub winner_id: TrackId,
    pub loser_id: TrackId,
    pub timestamp: DateTime<Utc>,
    pub winner_rating_before: f64,
    pub loser_rating_before: f64,
    pub winner_rating_after: f64,
    pub loser_rating_after: f64,
}

impl VoteRecord {
    /// Largest absolute rating change either participant saw in this vote
    pub fn swing(&self) -> f64 {
        let winner_delta = (self.winner_rating_after - self.winner_rating_before).abs();
        let loser_delta = (self.loser_rating_after - self.loser_rating_before).abs();
        winner_delta.max(loser_delta)
    }
}

/// Vote as submitted by a client; ids may be missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub winner_id: Option<TrackId>,
    #[serde(default)]
    pub loser_id: Option<TrackId>,
}

/// A track together with its current leaderboard position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedTrack {
    pub rank: u32,
    #[serde(flatten)]
    pub track: Track,
}

/// Two tracks to compare next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub a: Track,
    pub b: Track,
}
