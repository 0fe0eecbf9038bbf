//! Utility functions for the rankings service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique vote ID
pub fn generate_vote_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Round a rating to the nearest integer, halves away from zero
pub fn round_rating(rating: f64) -> f64 {
    rating.round()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: f64, rating2: f64) -> f64 {
    (rating1 - rating2).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_vote_id();
        let id2 = generate_vote_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_round_rating_halves_away_from_zero() {
        assert_eq!(round_rating(1515.5), 1516.0);
        assert_eq!(round_rating(1484.5), 1485.0);
        assert_eq!(round_rating(-0.5), -1.0);
        assert_eq!(round_rating(1515.49), 1515.0);
    }

    #[test]
    fn test_rating_difference() {
        assert_eq!(rating_difference(1500.0, 1400.0), 100.0);
        assert_eq!(rating_difference(1400.0, 1500.0), 100.0);
        assert_eq!(rating_difference(1500.0, 1500.0), 0.0);
    }
}
