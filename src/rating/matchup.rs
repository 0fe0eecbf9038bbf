//! Matchup selection for the next comparison
//!
//! Tracks with the fewest comparisons are shown first so new additions get
//! rated quickly; the opponent is the closest-rated of a few random picks.

use crate::error::{RankingError, Result};
use crate::types::{Matchup, RankingSnapshot};
use crate::utils::rating_difference;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::cmp::Ordering;

/// Number of random opponents considered for the second slot
pub const OPPONENT_SAMPLE_SIZE: usize = 5;

/// Pick two distinct tracks to compare next
pub fn select_matchup<R: Rng + ?Sized>(snapshot: &RankingSnapshot, rng: &mut R) -> Result<Matchup> {
    let tracks = &snapshot.tracks;
    if tracks.len() < 2 {
        return Err(RankingError::NotEnoughTracks {
            available: tracks.len(),
        }
        .into());
    }

    let fewest = tracks
        .iter()
        .map(|track| track.comparisons)
        .min()
        .unwrap_or(0);
    let least_compared: Vec<usize> = (0..tracks.len())
        .filter(|&idx| tracks[idx].comparisons == fewest)
        .collect();
    let first = *least_compared
        .choose(&mut *rng)
        .ok_or_else(|| RankingError::InternalError {
            message: "no candidate track for matchup".to_string(),
        })?;

    let others: Vec<usize> = (0..tracks.len()).filter(|&idx| idx != first).collect();
    let first_rating = tracks[first].rating;
    let second = others
        .choose_multiple(&mut *rng, OPPONENT_SAMPLE_SIZE)
        .copied()
        .min_by(|&a, &b| {
            rating_difference(tracks[a].rating, first_rating)
                .partial_cmp(&rating_difference(tracks[b].rating, first_rating))
                .unwrap_or(Ordering::Equal)
        })
        .ok_or_else(|| RankingError::InternalError {
            message: "no opponent track for matchup".to_string(),
        })?;

    Ok(Matchup {
        a: tracks[first].clone(),
        b: tracks[second].clone(),
    })
}
