//! Atomic publication of canonical revisions.
//!
//! One commit writes, in a single storage transaction:
//!
//! 1. the canonical state document,
//! 2. the numbered revision-history entry,
//! 3. every participant's masked view,
//! 4. the cleared speculative state of the game (snapshots and stacks), with
//!    the acting user's stack reset to the new revision.
//!
//! Rollback and rollforward republish a recorded revision through the same
//! write-set, minus the history append.

use chrono::Utc;
use strum::Display;
use tracing::{info, instrument, warn};

use crate::store::txn::{
    clear_game, prune_after, read_canonical, read_revision, write_canonical, write_revision,
    write_stack, write_views,
};
use crate::store::{DocumentStore, Txn};
use crate::{EngineError, Game, GameId, Stack, Uid};

/// Direction of an administrative revision jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Travel {
    /// To an older revision.
    Back,
    /// To a newer revision.
    Forward,
}

/// Verifies the stored canonical revision is the one the caller built on.
fn check_base<G: Game>(txn: &mut dyn Txn, game: GameId, base: u64) -> Result<(), EngineError> {
    match read_canonical::<G>(txn, game)? {
        Some(stored) if stored.head().revision() == base => Ok(()),
        Some(stored) => {
            warn!(
                game_id = %game,
                expected = base,
                found = stored.head().revision(),
                "Commit lost a race"
            );
            Err(EngineError::transient(format!(
                "game {} was updated concurrently; reload and retry",
                game
            )))
        }
        None => Err(EngineError::not_found(format!("game {} not found", game))),
    }
}

/// Orchestrates canonical writes against a document store.
#[derive(Debug, Clone, Copy)]
pub struct CommitCoordinator<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> CommitCoordinator<'a, S> {
    /// Wraps `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Writes a newly created game as revision 0.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the game id is taken.
    #[instrument(skip(self, state), fields(game_id = %state.head().id()))]
    pub fn create<G: Game>(&self, state: G) -> Result<G, EngineError> {
        let game = *state.head().id();
        self.store.transact(|txn| {
            if read_canonical::<G>(txn, game)?.is_some() {
                return Err(EngineError::validation(format!(
                    "game {} already exists",
                    game
                )));
            }
            write_canonical(txn, &state)?;
            write_revision(txn, &state, state.head().revision())?;
            write_views(txn, &state)
        })?;
        info!(game_id = %game, "Game created");
        Ok(state)
    }

    /// Publishes `state` as the next canonical revision on behalf of `acting`.
    ///
    /// `state` must carry the canonical revision it was derived from in its
    /// header. On success the returned state carries the new revision. On
    /// failure nothing is written and the caller's speculative state is
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns a transient error if another commit won the race, or any
    /// storage error from the transaction.
    pub fn commit<G: Game>(&self, state: G, acting: Uid) -> Result<G, EngineError> {
        self.commit_with(state, acting, |_, _| Ok(()))
            .map(|(state, ())| state)
    }

    /// Like [`CommitCoordinator::commit`], additionally running `extra` inside
    /// the same transaction after the canonical write-set. `extra` sees the
    /// state as published.
    ///
    /// # Errors
    ///
    /// Fails, writing nothing, if the commit or `extra` fails.
    #[instrument(skip(self, state, extra), fields(game_id = %state.head().id(), base = state.head().revision()))]
    pub fn commit_with<G, T, F>(
        &self,
        mut state: G,
        acting: Uid,
        extra: F,
    ) -> Result<(G, T), EngineError>
    where
        G: Game,
        F: FnOnce(&mut dyn Txn, &G) -> Result<T, EngineError>,
    {
        let game = *state.head().id();
        let base = state.head().revision();
        state.head_mut().set_stack(Stack::at(base));
        state.head_mut().stack_mut().commit();
        state.head_mut().touch(Utc::now());
        let rev = state.head().revision();

        let extra_value = self.store.transact(|txn| {
            check_base::<G>(txn, game, base)?;
            write_canonical(txn, &state)?;
            write_revision(txn, &state, rev)?;
            prune_after(txn, game, rev)?;
            write_views(txn, &state)?;
            clear_game(txn, game)?;
            write_stack(txn, game, acting, &Stack::at(rev))?;
            extra(txn, &state)
        })?;

        info!(game_id = %game, revision = rev, acting = %acting, "Revision committed");
        Ok((state, extra_value))
    }

    /// Republishes recorded revision `target` as canonical.
    ///
    /// `expected` is the canonical revision the caller observed. Every
    /// speculative cache of the game is discarded.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `target` lies on the wrong side of the
    /// current revision or was never recorded, and a transient error if the
    /// canonical revision moved since the caller observed it.
    #[instrument(skip(self), fields(game_id = %game))]
    pub fn republish<G: Game>(
        &self,
        game: GameId,
        expected: u64,
        target: u64,
        travel: Travel,
    ) -> Result<G, EngineError> {
        let in_range = match travel {
            Travel::Back => target < expected,
            Travel::Forward => target > expected,
        };
        if !in_range {
            return Err(EngineError::validation(format!(
                "cannot roll {} from revision {} to revision {}",
                travel, expected, target
            )));
        }

        let state = self.store.transact(|txn| {
            check_base::<G>(txn, game, expected)?;
            let mut state: G = read_revision(txn, game, target)?.ok_or_else(|| {
                EngineError::validation(format!("cannot roll {} any further", travel))
            })?;
            state.head_mut().set_stack(Stack::at(target));
            write_canonical(txn, &state)?;
            write_views(txn, &state)?;
            clear_game(txn, game)?;
            Ok(state)
        })?;

        info!(game_id = %game, from = expected, to = target, %travel, "Revision republished");
        Ok(state)
    }
}
