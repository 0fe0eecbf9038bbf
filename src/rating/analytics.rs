//! Vote log analytics
//!
//! Reports are derived from the vote log alone, so they stay valid even if
//! tracks later disappear from the snapshot.

use crate::types::{TrackId, VoteId, VoteRecord};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Minimum votes before a track competes for the best win rate
pub const MIN_VOTES_FOR_WIN_RATE: u32 = 3;

/// Days covered by the recent-activity counter
pub const RECENT_ACTIVITY_DAYS: i64 = 7;

/// Days covered by the per-day breakdown
pub const DAILY_HISTORY_DAYS: i64 = 30;

/// Win/loss totals of one track across the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackVoteStats {
    pub track_id: TrackId,
    pub wins: u32,
    pub losses: u32,
    pub total_votes: u32,
    pub win_rate: f64,
}

/// The single vote that moved a rating the most
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSwing {
    pub vote_id: VoteId,
    pub winner_id: TrackId,
    pub loser_id: TrackId,
    pub swing: f64,
    pub timestamp: DateTime<Utc>,
}

/// Number of votes cast on one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVoteCount {
    pub date: NaiveDate,
    pub votes: usize,
}

/// Aggregate report over a vote log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAnalytics {
    pub total_votes: usize,
    /// Ordered by total votes (descending), then track id
    pub track_stats: Vec<TrackVoteStats>,
    pub busiest_track: Option<TrackVoteStats>,
    pub best_win_rate: Option<TrackVoteStats>,
    pub largest_swing: Option<RatingSwing>,
    pub votes_last_7_days: usize,
    /// Last 30 days, oldest first, zero-filled
    pub daily_votes: Vec<DailyVoteCount>,
}

/// Compute the analytics report for `votes` as of `now`
pub fn compute_analytics(votes: &[VoteRecord], now: DateTime<Utc>) -> VoteAnalytics {
    let mut totals: HashMap<&str, (u32, u32)> = HashMap::new();
    for vote in votes {
        totals.entry(vote.winner_id.as_str()).or_default().0 += 1;
        totals.entry(vote.loser_id.as_str()).or_default().1 += 1;
    }

    let mut track_stats: Vec<TrackVoteStats> = totals
        .into_iter()
        .map(|(track_id, (wins, losses))| {
            let total_votes = wins + losses;
            TrackVoteStats {
                track_id: track_id.to_string(),
                wins,
                losses,
                total_votes,
                win_rate: wins as f64 / total_votes as f64,
            }
        })
        .collect();
    track_stats.sort_by(|a, b| {
        b.total_votes
            .cmp(&a.total_votes)
            .then_with(|| a.track_id.cmp(&b.track_id))
    });

    let busiest_track = track_stats.first().cloned();

    let best_win_rate = track_stats
        .iter()
        .filter(|stats| stats.total_votes >= MIN_VOTES_FOR_WIN_RATE)
        .fold(None::<&TrackVoteStats>, |best, candidate| match best {
            Some(current)
                if current
                    .win_rate
                    .partial_cmp(&candidate.win_rate)
                    .unwrap_or(Ordering::Equal)
                    != Ordering::Less =>
            {
                Some(current)
            }
            _ => Some(candidate),
        })
        .cloned();

    let largest_swing = votes
        .iter()
        .fold(None::<&VoteRecord>, |best, vote| match best {
            Some(current) if current.swing() >= vote.swing() => Some(current),
            _ => Some(vote),
        })
        .map(|vote| RatingSwing {
            vote_id: vote.id,
            winner_id: vote.winner_id.clone(),
            loser_id: vote.loser_id.clone(),
            swing: vote.swing(),
            timestamp: vote.timestamp,
        });

    let recent_cutoff = now - Duration::days(RECENT_ACTIVITY_DAYS);
    let votes_last_7_days = votes
        .iter()
        .filter(|vote| vote.timestamp >= recent_cutoff)
        .count();

    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for vote in votes {
        *per_day.entry(vote.timestamp.date_naive()).or_default() += 1;
    }
    let today = now.date_naive();
    let daily_votes = (0..DAILY_HISTORY_DAYS)
        .rev()
        .map(|days_ago| {
            let date = today - Duration::days(days_ago);
            DailyVoteCount {
                date,
                votes: per_day.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    VoteAnalytics {
        total_votes: votes.len(),
        track_stats,
        busiest_track,
        best_win_rate,
        largest_swing,
        votes_last_7_days,
        daily_votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_vote_id;

    fn vote(winner: &str, loser: &str, at: DateTime<Utc>, winner_gain: f64) -> VoteRecord {
        VoteRecord {
            id: generate_vote_id(),
            winner_id: winner.to_string(),
            loser_id: loser.to_string(),
            timestamp: at,
            winner_rating_before: 1500.0,
            loser_rating_before: 1500.0,
            winner_rating_after: 1500.0 + winner_gain,
            loser_rating_after: 1500.0 - winner_gain,
        }
    }

    #[test]
    fn test_empty_log() {
        let now = Utc::now();
        let report = compute_analytics(&[], now);

        assert_eq!(report.total_votes, 0);
        assert!(report.track_stats.is_empty());
        assert!(report.busiest_track.is_none());
        assert!(report.best_win_rate.is_none());
        assert!(report.largest_swing.is_none());
        assert_eq!(report.votes_last_7_days, 0);
        assert_eq!(report.daily_votes.len(), 30);
        assert!(report.daily_votes.iter().all(|day| day.votes == 0));
        assert_eq!(report.daily_votes.last().unwrap().date, now.date_naive());
    }

    #[test]
    fn test_per_track_totals_and_leaders() {
        let now = Utc::now();
        let votes = vec![
            vote("a", "b", now, 16.0),
            vote("a", "c", now, 15.0),
            vote("b", "a", now, 17.0),
            vote("a", "b", now, 14.0),
            vote("c", "b", now, 16.0),
        ];

        let report = compute_analytics(&votes, now);
        assert_eq!(report.total_votes, 5);

        let a = report
            .track_stats
            .iter()
            .find(|stats| stats.track_id == "a")
            .unwrap();
        assert_eq!(a.wins, 3);
        assert_eq!(a.losses, 1);
        assert_eq!(a.total_votes, 4);
        assert_eq!(a.win_rate, 0.75);

        // a and b both have 4 votes; id breaks the tie
        assert_eq!(report.busiest_track.unwrap().track_id, "a");
        // c only has 2 votes and is not eligible despite its 50% rate
        assert_eq!(report.best_win_rate.unwrap().track_id, "a");
    }

    #[test]
    fn test_largest_swing() {
        let now = Utc::now();
        let mut big = vote("b", "a", now, 12.0);
        big.loser_rating_after = big.loser_rating_before - 29.0;
        let votes = vec![vote("a", "b", now, 16.0), big.clone(), vote("c", "a", now, 20.0)];

        let swing = compute_analytics(&votes, now).largest_swing.unwrap();
        assert_eq!(swing.vote_id, big.id);
        assert_eq!(swing.swing, 29.0);
    }

    #[test]
    fn test_recent_activity_windows() {
        let now = Utc::now();
        let votes = vec![
            vote("a", "b", now, 16.0),
            vote("a", "b", now - Duration::days(1), 16.0),
            vote("a", "b", now - Duration::days(1), 16.0),
            vote("a", "b", now - Duration::days(6), 16.0),
            vote("a", "b", now - Duration::days(8), 16.0),
            vote("a", "b", now - Duration::days(45), 16.0),
        ];

        let report = compute_analytics(&votes, now);
        assert_eq!(report.votes_last_7_days, 4);

        let days = &report.daily_votes;
        assert_eq!(days.len(), 30);
        assert_eq!(days[29].votes, 1);
        assert_eq!(days[28].votes, 2);
        assert_eq!(days[23].votes, 1);
        assert_eq!(days[21].votes, 1);
        assert_eq!(days.iter().map(|day| day.votes).sum::<usize>(), 5);
    }
}
