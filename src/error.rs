//! Error types for the rankings service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific ranking scenarios
#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("Invalid vote: {reason}")]
    InvalidVote { reason: String },

    #[error("Track not found: {track_id}")]
    TrackNotFound { track_id: String },

    #[error("No rankings exist yet for collection: {collection_id}")]
    SnapshotMissing { collection_id: String },

    #[error("Not enough tracks to build a matchup: {available} available")]
    NotEnoughTracks { available: usize },

    #[error("Snapshot version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("Track source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Storage backend '{backend}' failed: {message}")]
    StorageError { backend: String, message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl RankingError {
    /// Look up the ranking error carried by an `anyhow::Error`, if any
    pub fn classify(error: &anyhow::Error) -> Option<&RankingError> {
        error.downcast_ref::<RankingError>()
    }
}
