//! Ranking engine: applies pairwise votes to ranking snapshots
//!
//! Every operation here is pure. Snapshots are taken by reference and new
//! snapshots are returned; persisting them is the store's job.
//!
//! Ranks are assigned by a stable sort on rating (descending), so tracks with
//! equal ratings keep the order they have in `snapshot.tracks`.

use crate::error::{RankingError, Result};
use crate::rating::calculator::RatingCalculator;
use crate::rating::elo::EloRatingCalculator;
use crate::types::{
    ObservedTrack, RankedTrack, RankingSnapshot, RatingCheckpoint, Track, VoteRecord,
};
use crate::utils::generate_vote_id;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Decides when a track's rank history gains a new checkpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointPolicy {
    /// Minimum absolute rank movement since the last checkpoint
    pub min_rank_change: u32,
    /// Minimum absolute rating movement since the last checkpoint
    pub min_rating_change: f64,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            min_rank_change: 2,
            min_rating_change: 50.0,
        }
    }
}

impl CheckpointPolicy {
    pub fn should_checkpoint(&self, last: &RatingCheckpoint, rating: f64, rank: u32) -> bool {
        let rank_change = (i64::from(rank) - i64::from(last.rank)).unsigned_abs();
        let rating_change = (rating - last.rating).abs();
        rank_change >= u64::from(self.min_rank_change) || rating_change >= self.min_rating_change
    }
}

/// Pure ranking engine
#[derive(Clone)]
pub struct RankingEngine {
    calculator: Arc<dyn RatingCalculator>,
    checkpoint_policy: CheckpointPolicy,
}

impl std::fmt::Debug for RankingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingEngine")
            .field("calculator", &self.calculator.config())
            .field("checkpoint_policy", &self.checkpoint_policy)
            .finish()
    }
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(EloRatingCalculator::default()),
            CheckpointPolicy::default(),
        )
    }
}

impl RankingEngine {
    pub fn new(calculator: Arc<dyn RatingCalculator>, checkpoint_policy: CheckpointPolicy) -> Self {
        Self {
            calculator,
            checkpoint_policy,
        }
    }

    fn seed_track(&self, observed: ObservedTrack, now: DateTime<Utc>) -> Track {
        let mut track = Track::seeded(observed, now);
        let initial = self.calculator.initial_rating();
        track.rating = initial;
        for checkpoint in &mut track.rating_history {
            checkpoint.rating = initial;
        }
        track
    }

    /// Create the first snapshot of a collection
    pub fn seed_snapshot(
        &self,
        collection_id: &str,
        collection_name: &str,
        tracks: Vec<ObservedTrack>,
        now: DateTime<Utc>,
    ) -> RankingSnapshot {
        let mut snapshot = RankingSnapshot {
            collection_id: collection_id.to_string(),
            collection_name: collection_name.to_string(),
            last_updated: now,
            total_votes: 0,
            version: 0,
            tracks: Vec::with_capacity(tracks.len()),
        };

        let mut seen = HashSet::new();
        for observed in tracks {
            if seen.insert(observed.id.clone()) {
                snapshot.tracks.push(self.seed_track(observed, now));
            }
        }

        debug!(
            "Seeded snapshot for collection '{}' with {} tracks",
            snapshot.collection_id,
            snapshot.tracks.len()
        );
        snapshot
    }

    /// Add observed tracks the snapshot does not know yet.
    ///
    /// Existing tracks are never touched. Returns the new snapshot and the
    /// number of tracks added; the version only moves when tracks were added.
    pub fn merge_new_tracks(
        &self,
        snapshot: &RankingSnapshot,
        observed: Vec<ObservedTrack>,
        now: DateTime<Utc>,
    ) -> (RankingSnapshot, usize) {
        let mut merged = snapshot.clone();
        let mut known: HashSet<String> = merged.tracks.iter().map(|t| t.id.clone()).collect();

        let mut added = 0;
        for track in observed {
            if known.insert(track.id.clone()) {
                merged.tracks.push(self.seed_track(track, now));
                added += 1;
            }
        }

        if added > 0 {
            merged.last_updated = now;
            merged.version += 1;
            debug!(
                "Merged {} new tracks into collection '{}'",
                added, merged.collection_id
            );
        }

        (merged, added)
    }

    /// Apply one pairwise vote.
    ///
    /// Fails without producing anything when the ids are equal or either id
    /// is unknown to the snapshot.
    pub fn apply_vote(
        &self,
        snapshot: &RankingSnapshot,
        winner_id: &str,
        loser_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(RankingSnapshot, VoteRecord)> {
        if winner_id == loser_id {
            return Err(RankingError::InvalidVote {
                reason: "winner and loser must be different tracks".to_string(),
            }
            .into());
        }

        let winner_idx = position_of(snapshot, winner_id)?;
        let loser_idx = position_of(snapshot, loser_id)?;

        let mut updated = snapshot.clone();
        let winner_before = updated.tracks[winner_idx].rating;
        let loser_before = updated.tracks[loser_idx].rating;
        let result = self.calculator.rate_pair(winner_before, loser_before);

        {
            let winner = &mut updated.tracks[winner_idx];
            winner.rating = result.winner_rating;
            winner.wins += 1;
            winner.comparisons += 1;
            winner.last_updated = now;
        }
        {
            let loser = &mut updated.tracks[loser_idx];
            loser.rating = result.loser_rating;
            loser.losses += 1;
            loser.comparisons += 1;
            loser.last_updated = now;
        }

        let ranks = compute_ranks(&updated.tracks);
        for (track, rank) in updated.tracks.iter_mut().zip(ranks) {
            let due = match track.last_checkpoint() {
                Some(last) => self.checkpoint_policy.should_checkpoint(last, track.rating, rank),
                None => true,
            };
            if due {
                track.rating_history.push(RatingCheckpoint {
                    timestamp: now,
                    rating: track.rating,
                    rank,
                });
            }
        }

        updated.total_votes += 1;
        updated.version += 1;
        updated.last_updated = now;

        let record = VoteRecord {
            id: generate_vote_id(),
            winner_id: winner_id.to_string(),
            loser_id: loser_id.to_string(),
            timestamp: now,
            winner_rating_before: winner_before,
            loser_rating_before: loser_before,
            winner_rating_after: result.winner_rating,
            loser_rating_after: result.loser_rating,
        };

        debug!(
            "Vote applied - winner: '{}' {} -> {}, loser: '{}' {} -> {}",
            winner_id,
            winner_before,
            result.winner_rating,
            loser_id,
            loser_before,
            result.loser_rating
        );

        Ok((updated, record))
    }
}

fn position_of(snapshot: &RankingSnapshot, track_id: &str) -> Result<usize> {
    snapshot
        .tracks
        .iter()
        .position(|track| track.id == track_id)
        .ok_or_else(|| {
            RankingError::TrackNotFound {
                track_id: track_id.to_string(),
            }
            .into()
        })
}

/// Stable ordering of track indices, highest rating first
fn leaderboard_order(tracks: &[Track]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..tracks.len()).collect();
    order.sort_by(|&a, &b| {
        tracks[b]
            .rating
            .partial_cmp(&tracks[a].rating)
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// 1-based rank of every track, indexed like `tracks`
pub fn compute_ranks(tracks: &[Track]) -> Vec<u32> {
    let mut ranks = vec![0; tracks.len()];
    for (position, idx) in leaderboard_order(tracks).into_iter().enumerate() {
        ranks[idx] = position as u32 + 1;
    }
    ranks
}

/// Tracks in leaderboard order together with their rank
pub fn ranked_tracks(snapshot: &RankingSnapshot) -> Vec<RankedTrack> {
    leaderboard_order(&snapshot.tracks)
        .into_iter()
        .enumerate()
        .map(|(position, idx)| RankedTrack {
            rank: position as u32 + 1,
            track: snapshot.tracks[idx].clone(),
        })
        .collect()
}
