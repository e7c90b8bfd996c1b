//! Pairwise Elo ratings computed from placements.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{GameId, Placements, Uid};

/// One past rating, written when a game finalizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct EloEntry {
    rating: f64,
    game_id: GameId,
    recorded_at: DateTime<Utc>,
}

/// Current rating plus append-only history for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct EloRecord {
    uid: Uid,
    rating: f64,
    history: Vec<EloEntry>,
}

impl EloRecord {
    /// A record for a user with no rated games.
    pub fn starting(uid: Uid, rating: f64) -> Self {
        Self {
            uid,
            rating,
            history: Vec::new(),
        }
    }

    /// Moves the rating by `delta` and appends the result to the history.
    pub fn apply(&mut self, delta: f64, game_id: GameId, now: DateTime<Utc>) {
        self.rating += delta;
        self.history.push(EloEntry {
            rating: self.rating,
            game_id,
            recorded_at: now,
        });
    }
}

/// Elo calculator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Getters)]
pub struct EloEngine {
    k_factor: f64,
    starting_rating: f64,
}

impl Default for EloEngine {
    fn default() -> Self {
        Self::new(32.0, 1500.0)
    }
}

impl EloEngine {
    /// Creates an engine with the given K factor and starting rating.
    pub fn new(k_factor: f64, starting_rating: f64) -> Self {
        Self {
            k_factor,
            starting_rating,
        }
    }

    /// Expected score of a player rated `rating` against `opponent`.
    pub fn expected(&self, rating: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
    }

    /// Rating change for one pairing. `score` is 1 for a win, 0.5 for a tie, 0 for a loss.
    pub fn delta(&self, rating: f64, opponent: f64, score: f64) -> f64 {
        self.k_factor * (score - self.expected(rating, opponent))
    }

    /// Total rating change per user.
    ///
    /// Every pairing uses the pre-game ratings in `ratings`; users missing
    /// from `ratings` are rated at the starting rating.
    #[instrument(skip(self, placements, ratings), fields(players = placements.len()))]
    pub fn deltas(
        &self,
        placements: &Placements,
        ratings: &BTreeMap<Uid, f64>,
    ) -> BTreeMap<Uid, f64> {
        let ranked: Vec<(Uid, u32)> = placements
            .iter()
            .flat_map(|(rank, uids)| uids.iter().map(move |uid| (*uid, rank)))
            .collect();
        let rating_of = |uid: &Uid| ratings.get(uid).copied().unwrap_or(self.starting_rating);

        let mut deltas = BTreeMap::new();
        for (a, rank_a) in &ranked {
            let mut total = 0.0;
            for (b, rank_b) in &ranked {
                if a == b {
                    continue;
                }
                let score = match rank_a.cmp(rank_b) {
                    std::cmp::Ordering::Less => 1.0,
                    std::cmp::Ordering::Greater => 0.0,
                    std::cmp::Ordering::Equal => 0.5,
                };
                total += self.delta(rating_of(a), rating_of(b), score);
            }
            debug!(uid = %a, delta = total, "Elo delta computed");
            deltas.insert(*a, total);
        }
        deltas
    }

    /// Applies one finalization to `records`, creating starting records for
    /// placed users that have none.
    #[instrument(skip(self, records, placements), fields(game_id = %game_id))]
    pub fn update(
        &self,
        records: BTreeMap<Uid, EloRecord>,
        placements: &Placements,
        game_id: GameId,
        now: DateTime<Utc>,
    ) -> (BTreeMap<Uid, EloRecord>, BTreeMap<Uid, f64>) {
        let ratings: BTreeMap<Uid, f64> = records
            .iter()
            .map(|(uid, record)| (*uid, record.rating))
            .collect();
        let deltas = self.deltas(placements, &ratings);

        let mut records = records;
        for (uid, delta) in &deltas {
            records
                .entry(*uid)
                .or_insert_with(|| EloRecord::starting(*uid, self.starting_rating))
                .apply(*delta, game_id, now);
        }
        (records, deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_ratings_split_k() {
        let engine = EloEngine::default();
        assert!((engine.delta(1500.0, 1500.0, 1.0) - 16.0).abs() < 1e-9);
        assert!((engine.delta(1500.0, 1500.0, 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let engine = EloEngine::default();
        let upset = engine.delta(1400.0, 1600.0, 1.0);
        let expected_win = engine.delta(1600.0, 1400.0, 1.0);
        assert!(upset > expected_win);
    }
}
