//! Rating calculator trait for pairwise outcomes
//!
//! This module defines the interface for rating calculations so the ranking
//! engine does not depend on one particular rating system.

use serde::{Deserialize, Serialize};

/// Result of rating one pairwise comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairwiseRatingResult {
    /// Probability the winner was expected to win (0.0 to 1.0)
    pub expected_winner: f64,
    /// Probability the loser was expected to win (0.0 to 1.0)
    pub expected_loser: f64,
    pub winner_rating: f64,
    pub loser_rating: f64,
}

impl PairwiseRatingResult {
    pub fn winner_delta(&self, winner_before: f64) -> f64 {
        self.winner_rating - winner_before
    }

    pub fn loser_delta(&self, loser_before: f64) -> f64 {
        self.loser_rating - loser_before
    }
}

/// Trait for calculating rating changes after a pairwise vote
pub trait RatingCalculator: Send + Sync {
    /// Calculate new ratings for a decided comparison
    ///
    /// # Arguments
    /// * `winner_rating` - rating of the preferred track before the vote
    /// * `loser_rating` - rating of the other track before the vote
    fn rate_pair(&self, winner_rating: f64, loser_rating: f64) -> PairwiseRatingResult;

    /// Get the initial rating for new tracks
    fn initial_rating(&self) -> f64;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;
}
