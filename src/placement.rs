//! Finishing order from final scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::Uid;

/// Mapping from rank (1 = best) to the users tied at that rank.
///
/// Ties share a rank and the following rank skips by the size of the tie,
/// so two players tied for first are followed by third.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Placements(BTreeMap<u32, Vec<Uid>>);

impl Placements {
    /// Groups players by descending score.
    #[instrument(skip(scores), fields(players = scores.len()))]
    pub fn resolve(scores: &[(Uid, i64)]) -> Self {
        let mut remaining: Vec<(Uid, i64)> = scores.to_vec();
        remaining.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut ranks = BTreeMap::new();
        let mut rank = 1u32;
        let mut rest = remaining.as_slice();
        while let Some(&(_, best)) = rest.first() {
            let tied = rest.iter().take_while(|(_, score)| *score == best).count();
            let uids: Vec<Uid> = rest[..tied].iter().map(|(uid, _)| *uid).collect();
            debug!(rank, score = best, ?uids, "Rank assigned");
            ranks.insert(rank, uids);
            rank += tied as u32;
            rest = &rest[tied..];
        }
        Self(ranks)
    }

    /// Rank of `uid`, if the user placed.
    pub fn rank_of(&self, uid: Uid) -> Option<u32> {
        self.0
            .iter()
            .find(|(_, uids)| uids.contains(&uid))
            .map(|(rank, _)| *rank)
    }

    /// Users at `rank`.
    pub fn at(&self, rank: u32) -> &[Uid] {
        self.0.get(&rank).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Users placed first.
    pub fn winners(&self) -> &[Uid] {
        self.at(1)
    }

    /// Occupied ranks in ascending order.
    pub fn ranks(&self) -> Vec<u32> {
        self.0.keys().copied().collect()
    }

    /// Iterates `(rank, users)` in ascending rank order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[Uid])> {
        self.0.iter().map(|(rank, uids)| (*rank, uids.as_slice()))
    }

    /// Number of placed users.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Whether nobody placed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
