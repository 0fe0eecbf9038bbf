//! Rating system for pairwise track votes
//!
//! This module provides Elo rating calculations (via the skillratings crate),
//! the pure ranking engine, matchup selection and vote log analytics.

pub mod analytics;
pub mod calculator;
pub mod elo;
pub mod engine;
pub mod matchup;

// Re-export commonly used types
pub use analytics::{compute_analytics, VoteAnalytics};
pub use calculator::{PairwiseRatingResult, RatingCalculator};
pub use elo::{EloRatingCalculator, EloSettings};
pub use engine::{compute_ranks, ranked_tracks, CheckpointPolicy, RankingEngine};
pub use matchup::select_matchup;
