//! Immutable revision history.

use tracing::{debug, instrument};

use crate::store::{Collection, DocKey, DocumentStore, StoreExt, Txn, TxnExt};
use crate::{EngineError, Game, GameId};

/// Read access to the numbered revision history of games.
#[derive(Debug, Clone, Copy)]
pub struct RevisionStore<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> RevisionStore<'a, S> {
    /// Wraps `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Loads revision `rev` of `game`, if recorded.
    #[instrument(skip(self), fields(game_id = %game))]
    pub fn get<G: Game>(&self, game: GameId, rev: u64) -> Result<Option<G>, EngineError> {
        self.store.load(&DocKey::revision(game, rev))
    }

    /// Recorded revision numbers of `game`, ascending.
    #[instrument(skip(self), fields(game_id = %game))]
    pub fn list(&self, game: GameId) -> Result<Vec<u64>, EngineError> {
        Ok(self
            .store
            .scan(Collection::Revisions, &DocKey::game_prefix(game))?
            .iter()
            .filter_map(|(key, _)| key.trailing_rev())
            .collect())
    }
}

/// Appends history entry `rev` inside a transaction.
pub(crate) fn write<G: Game>(txn: &mut dyn Txn, state: &G, rev: u64) -> Result<(), EngineError> {
    txn.write(&DocKey::revision(*state.head().id(), rev), state)
}

/// Reads history entry `rev` inside a transaction.
pub(crate) fn read<G: Game>(
    txn: &mut dyn Txn,
    game: GameId,
    rev: u64,
) -> Result<Option<G>, EngineError> {
    txn.read(&DocKey::revision(game, rev))
}

/// Deletes history entries newer than `rev`, left over from a branch
/// abandoned by a rollback. Returns how many were removed.
pub(crate) fn prune_after(txn: &mut dyn Txn, game: GameId, rev: u64) -> Result<usize, EngineError> {
    let stale: Vec<DocKey> = txn
        .scan(Collection::Revisions, &DocKey::game_prefix(game))?
        .into_iter()
        .map(|(key, _)| key)
        .filter(|key| key.trailing_rev().is_some_and(|r| r > rev))
        .collect();
    for key in &stale {
        txn.delete(key)?;
    }
    if !stale.is_empty() {
        debug!(game_id = %game, after = rev, pruned = stale.len(), "Abandoned revisions pruned");
    }
    Ok(stale.len())
}
