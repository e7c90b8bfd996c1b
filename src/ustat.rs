//! Lifetime per-user statistics.

use std::collections::BTreeMap;

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{Scorecard, Uid};

/// Bucket holding totals across every player count.
pub const ALL_COUNTS: usize = 0;

/// Accumulated counters for one player-count bucket.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Getters)]
pub struct StatBucket {
    played: u64,
    won: u64,
    moves: u64,
    think_secs: u64,
    score: i64,
    win_percentage: f64,
    average_score: f64,
    average_moves: f64,
    average_think_secs: f64,
}

impl StatBucket {
    fn record(&mut self, card: &Scorecard, won: bool) {
        self.played += 1;
        if won {
            self.won += 1;
        }
        self.moves += u64::from(*card.moves());
        self.think_secs += *card.think_secs();
        self.score += *card.score();
        self.recompute();
    }

    fn recompute(&mut self) {
        if self.played > 0 {
            let played = self.played as f64;
            self.win_percentage = self.won as f64 / played * 100.0;
            self.average_score = self.score as f64 / played;
        }
        if self.moves > 0 {
            self.average_moves = self.moves as f64 / self.played.max(1) as f64;
            self.average_think_secs = self.think_secs as f64 / self.moves as f64;
        }
    }
}

/// Lifetime aggregate for one user, bucketed by player count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct UStat {
    uid: Uid,
    buckets: BTreeMap<usize, StatBucket>,
}

impl UStat {
    /// Empty statistics for `uid`.
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            buckets: BTreeMap::new(),
        }
    }

    /// Bucket for games with `num_players` players (or [`ALL_COUNTS`]).
    pub fn bucket(&self, num_players: usize) -> Option<&StatBucket> {
        self.buckets.get(&num_players)
    }

    /// Totals across every player count.
    pub fn overall(&self) -> StatBucket {
        self.bucket(ALL_COUNTS).cloned().unwrap_or_default()
    }

    /// Records one finished game into the overall and per-count buckets.
    #[instrument(skip(self, card), fields(uid = %self.uid))]
    pub fn record(&mut self, num_players: usize, card: &Scorecard, won: bool) {
        self.buckets
            .entry(ALL_COUNTS)
            .or_default()
            .record(card, won);
        self.buckets
            .entry(num_players)
            .or_default()
            .record(card, won);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fills_both_buckets() {
        let mut stat = UStat::new(Uid(1));
        stat.record(3, &Scorecard::new(Uid(1), 12, 4, 40), true);
        stat.record(2, &Scorecard::new(Uid(1), 6, 2, 10), false);

        let all = stat.overall();
        assert_eq!(*all.played(), 2);
        assert_eq!(*all.won(), 1);
        assert_eq!(*all.score(), 18);
        assert!((all.win_percentage() - 50.0).abs() < 1e-9);
        assert!((all.average_score() - 9.0).abs() < 1e-9);
        assert!((all.average_think_secs() - (50.0 / 6.0)).abs() < 1e-9);

        let three = stat.bucket(3).unwrap();
        assert_eq!(*three.played(), 1);
        assert_eq!(*three.won(), 1);
    }

    #[test]
    fn test_zero_moves_leaves_move_averages_zero() {
        let mut stat = UStat::new(Uid(1));
        stat.record(2, &Scorecard::new(Uid(1), 0, 0, 0), false);
        let all = stat.overall();
        assert_eq!(*all.average_moves(), 0.0);
        assert_eq!(*all.average_think_secs(), 0.0);
        assert_eq!(*all.win_percentage(), 0.0);
    }
}
