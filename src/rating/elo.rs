//! Elo rating system implementation
//!
//! This module provides a concrete implementation of the rating calculator
//! using the Elo algorithm from the skillratings crate. New ratings are
//! rounded to whole points, halves away from zero.

use crate::rating::calculator::{PairwiseRatingResult, RatingCalculator};
use crate::types::INITIAL_RATING;
use crate::utils::round_rating;
use serde::{Deserialize, Serialize};
use skillratings::elo::{elo, expected_score, EloConfig, EloRating};
use skillratings::Outcomes;

/// Maximum rating points exchanged per vote
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Configuration for the Elo rating system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloSettings {
    pub k_factor: f64,
    pub initial_rating: f64,
}

impl Default for EloSettings {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            initial_rating: INITIAL_RATING,
        }
    }
}

impl EloSettings {
    /// Validate configuration parameters
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.k_factor <= 0.0 || !self.k_factor.is_finite() {
            return Err(crate::error::RankingError::ConfigurationError {
                message: "K-factor must be a positive number".to_string(),
            }
            .into());
        }

        if !self.initial_rating.is_finite() {
            return Err(crate::error::RankingError::ConfigurationError {
                message: "Initial rating must be finite".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Elo rating calculator implementation
#[derive(Debug, Clone)]
pub struct EloRatingCalculator {
    settings: EloSettings,
}

impl EloRatingCalculator {
    /// Create a new Elo rating calculator
    pub fn new(settings: EloSettings) -> crate::error::Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn k_factor(&self) -> f64 {
        self.settings.k_factor
    }

    /// Probability of `rating` beating `opponent`
    pub fn expected_score(&self, rating: f64, opponent: f64) -> f64 {
        let (expected, _) = expected_score(&EloRating { rating }, &EloRating { rating: opponent });
        expected
    }
}

impl Default for EloRatingCalculator {
    fn default() -> Self {
        Self {
            settings: EloSettings::default(),
        }
    }
}

impl RatingCalculator for EloRatingCalculator {
    fn rate_pair(&self, winner_rating: f64, loser_rating: f64) -> PairwiseRatingResult {
        let winner = EloRating {
            rating: winner_rating,
        };
        let loser = EloRating {
            rating: loser_rating,
        };
        let config = EloConfig {
            k: self.settings.k_factor,
        };

        let (expected_winner, expected_loser) = expected_score(&winner, &loser);
        let (new_winner, new_loser) = elo(&winner, &loser, &Outcomes::WIN, &config);

        PairwiseRatingResult {
            expected_winner,
            expected_loser,
            winner_rating: round_rating(new_winner.rating),
            loser_rating: round_rating(new_loser.rating),
        }
    }

    fn initial_rating(&self) -> f64 {
        self.settings.initial_rating
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.settings).unwrap_or(serde_json::Value::Null)
    }
}
