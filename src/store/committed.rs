//! Canonical state and per-user views.

use tracing::{debug, instrument};

use crate::store::{DocKey, DocumentStore, StoreExt, Txn, TxnExt};
use crate::{EngineError, Game, GameId, Uid};

/// Read access to the canonical state of games.
#[derive(Debug, Clone, Copy)]
pub struct CommittedStore<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> CommittedStore<'a, S> {
    /// Wraps `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Loads the canonical state of `game`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the game does not exist.
    #[instrument(skip(self), fields(game_id = %game))]
    pub fn get<G: Game>(&self, game: GameId) -> Result<G, EngineError> {
        self.store
            .load(&DocKey::game(game))?
            .ok_or_else(|| EngineError::not_found(format!("game {} not found", game)))
    }

    /// Loads the masked view of `game` published for `uid`.
    #[instrument(skip(self), fields(game_id = %game, uid = %uid))]
    pub fn view<G: Game>(&self, game: GameId, uid: Uid) -> Result<Option<G>, EngineError> {
        self.store.load(&DocKey::view(game, uid))
    }
}

/// Reads canonical state inside a transaction.
pub(crate) fn read<G: Game>(txn: &mut dyn Txn, game: GameId) -> Result<Option<G>, EngineError> {
    txn.read(&DocKey::game(game))
}

/// Overwrites canonical state inside a transaction.
pub(crate) fn write<G: Game>(txn: &mut dyn Txn, state: &G) -> Result<(), EngineError> {
    txn.write(&DocKey::game(*state.head().id()), state)
}

/// Replaces every participant's masked view inside a transaction.
pub(crate) fn write_views<G: Game>(txn: &mut dyn Txn, state: &G) -> Result<(), EngineError> {
    let game = *state.head().id();
    let (uids, views) = state.views();
    if uids.len() != views.len() {
        return Err(EngineError::internal(format!(
            "game {} produced {} views for {} users",
            game,
            views.len(),
            uids.len()
        )));
    }
    for (uid, view) in uids.iter().zip(&views) {
        txn.write(&DocKey::view(game, *uid), view)?;
    }
    debug!(game_id = %game, views = uids.len(), "Views written");
    Ok(())
}
