//! Per-user speculative snapshots and revision stacks.

use tracing::{debug, instrument, warn};

use crate::store::{Collection, DocKey, DocumentStore, StoreExt, Txn, TxnExt};
use crate::{EngineError, Game, GameId, Stack, Uid};

/// Read access to speculative per-user state.
#[derive(Debug, Clone, Copy)]
pub struct CachedViewStore<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> CachedViewStore<'a, S> {
    /// Wraps `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Revision stack of `uid` in `game`, given the canonical revision.
    ///
    /// A missing stack, or one left behind by an older canonical revision,
    /// reads as the zero-equivalent at `committed`.
    #[instrument(skip(self), fields(game_id = %game, uid = %uid))]
    pub fn stack(&self, game: GameId, uid: Uid, committed: u64) -> Result<Stack, EngineError> {
        let stored: Option<Stack> = self.store.load(&DocKey::stack(game, uid))?;
        Ok(match stored {
            Some(stack) if stack.committed() == committed => stack,
            Some(stack) => {
                warn!(stored = stack.committed(), committed, "Ignoring stale revision stack");
                Stack::at(committed)
            }
            None => Stack::at(committed),
        })
    }

    /// Speculative snapshot `rev` of `uid` in `game`, if present.
    #[instrument(skip(self), fields(game_id = %game, uid = %uid))]
    pub fn get<G: Game>(&self, game: GameId, uid: Uid, rev: u64) -> Result<Option<G>, EngineError> {
        self.store.load(&DocKey::cached(game, uid, rev))
    }

    /// Number of snapshots held for `game` across all users.
    pub fn count(&self, game: GameId) -> Result<usize, EngineError> {
        Ok(self
            .store
            .scan(Collection::Cache, &DocKey::game_prefix(game))?
            .len())
    }
}

/// Reads `uid`'s revision stack inside a transaction, with the same
/// stale-or-missing fallback as [`CachedViewStore::stack`].
pub(crate) fn read_stack(
    txn: &mut dyn Txn,
    game: GameId,
    uid: Uid,
    committed: u64,
) -> Result<Stack, EngineError> {
    Ok(txn
        .read::<Stack>(&DocKey::stack(game, uid))?
        .filter(|stack| stack.committed() == committed)
        .unwrap_or_else(|| Stack::at(committed)))
}

/// Stores `uid`'s revision stack inside a transaction.
pub(crate) fn write_stack(
    txn: &mut dyn Txn,
    game: GameId,
    uid: Uid,
    stack: &Stack,
) -> Result<(), EngineError> {
    txn.write(&DocKey::stack(game, uid), stack)
}

/// Stores a speculative snapshot at `rev` inside a transaction.
pub(crate) fn write_snapshot<G: Game>(
    txn: &mut dyn Txn,
    uid: Uid,
    rev: u64,
    state: &G,
) -> Result<(), EngineError> {
    txn.write(&DocKey::cached(*state.head().id(), uid, rev), state)
}

/// Deletes `uid`'s snapshots above `rev`, which a new move made unreachable.
pub(crate) fn prune_above(
    txn: &mut dyn Txn,
    game: GameId,
    uid: Uid,
    rev: u64,
) -> Result<usize, EngineError> {
    let stale: Vec<DocKey> = txn
        .scan(Collection::Cache, &DocKey::user_prefix(game, uid))?
        .into_iter()
        .map(|(key, _)| key)
        .filter(|key| key.trailing_rev().is_some_and(|r| r > rev))
        .collect();
    for key in &stale {
        txn.delete(key)?;
    }
    Ok(stale.len())
}

/// Deletes every snapshot and revision stack of `game`.
pub(crate) fn clear_game(txn: &mut dyn Txn, game: GameId) -> Result<usize, EngineError> {
    let prefix = DocKey::game_prefix(game);
    let mut cleared = 0;
    for collection in [Collection::Cache, Collection::Stacks] {
        for (key, _) in txn.scan(collection, &prefix)? {
            txn.delete(&key)?;
            cleared += 1;
        }
    }
    debug!(game_id = %game, cleared, "Speculative state cleared");
    Ok(cleared)
}
