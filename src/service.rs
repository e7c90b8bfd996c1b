//! Action routing over the revision engine.
//!
//! [`GameService`] loads a user's working state (canonical or speculative,
//! depending on their revision stack), applies a game action, and routes the
//! result down one of three paths:
//!
//! - **cache**: the player keeps the turn; a speculative snapshot is stored
//!   and canonical state is untouched.
//! - **commit**: the turn passes; a new canonical revision is published and
//!   every speculative cache of the game is cleared.
//! - **finalize**: nobody remains to act; placements, ratings and statistics
//!   are recorded with the terminal state.

use std::marker::PhantomData;

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::store::txn::{prune_above, read_canonical, read_stack, write_snapshot, write_stack};
use crate::store::{CachedViewStore, CommittedStore, DocumentStore, RevisionStore, Txn};
use crate::{
    CommitCoordinator, Dispatcher, EloEngine, EngineConfig, EngineError, Game, GameId, GameResult,
    Header, Identity, Notification, Outcome, PlayerIdentity, Stack, Status, Travel, TurnFinalizer,
    Uid,
};

/// Result of applying one action.
#[derive(Debug, Clone)]
pub enum Applied<G> {
    /// Stored as a speculative snapshot.
    Cached {
        /// The acting user's new working state.
        state: G,
        /// The acting user's revision stack after the move.
        stack: Stack,
    },
    /// Published as a new canonical revision.
    Committed {
        /// The new canonical state.
        state: G,
    },
    /// Ended the game.
    Finalized {
        /// The terminal canonical state.
        state: G,
        /// Placements and rating changes.
        result: GameResult,
    },
}

impl<G> Applied<G> {
    /// The state produced by the action.
    pub fn state(&self) -> &G {
        match self {
            Self::Cached { state, .. }
            | Self::Committed { state }
            | Self::Finalized { state, .. } => state,
        }
    }
}

/// Verifies canonical state has not moved from `base`.
fn ensure_canonical<G: Game>(txn: &mut dyn Txn, game: GameId, base: u64) -> Result<(), EngineError> {
    let stored = read_canonical::<G>(txn, game)?
        .ok_or_else(|| EngineError::not_found(format!("game {} not found", game)))?;
    if stored.head().revision() != base {
        return Err(EngineError::transient(format!(
            "game {} was updated concurrently; reload and retry",
            game
        )));
    }
    Ok(())
}

/// Verifies `uid`'s stored revision stack is still the one the caller read.
fn ensure_stack(
    txn: &mut dyn Txn,
    game: GameId,
    uid: Uid,
    base: u64,
    observed: &Stack,
) -> Result<(), EngineError> {
    let stored = read_stack(txn, game, uid, base)?;
    if stored != *observed {
        return Err(EngineError::transient(format!(
            "revision stack of user {} in game {} was updated concurrently; reload and retry",
            uid, game
        )));
    }
    Ok(())
}

/// Game operations for one game type over one document store.
#[derive(Debug)]
pub struct GameService<S, G> {
    store: S,
    elo: EloEngine,
    dispatcher: Dispatcher,
    max_players: usize,
    _game: PhantomData<fn() -> G>,
}

impl<S: DocumentStore, G: Game> GameService<S, G> {
    /// Creates a service over `store`.
    #[instrument(skip(store, config, dispatcher), fields(game_type = G::game_type()))]
    pub fn new(store: S, config: &EngineConfig, dispatcher: Dispatcher) -> Self {
        info!("Creating GameService");
        let dispatcher = if *config.notify() {
            dispatcher
        } else {
            Dispatcher::disabled()
        };
        Self {
            store,
            elo: config.elo().engine(),
            dispatcher,
            max_players: *config.max_players(),
            _game: PhantomData,
        }
    }

    /// The underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn canonical(&self, game: GameId) -> Result<G, EngineError> {
        CommittedStore::new(&self.store).get(game)
    }

    fn commits(&self) -> CommitCoordinator<'_, S> {
        CommitCoordinator::new(&self.store)
    }

    fn notify_turn(&self, state: &G) {
        self.dispatcher.dispatch(
            state.head().current_uids(),
            Notification::YourTurn {
                game_id: *state.head().id(),
                title: state.head().title().clone(),
            },
        );
    }

    /// Creates a recruiting game with `creator` as its first player.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unsupported player count or a taken id.
    #[instrument(skip(self, creator, email, password), fields(creator = %creator.uid()))]
    pub fn create_game(
        &self,
        id: GameId,
        creator: &Identity,
        email: &str,
        title: &str,
        num_players: usize,
        password: Option<&str>,
    ) -> Result<G, EngineError> {
        if num_players < 2 || num_players > self.max_players {
            return Err(EngineError::validation(format!(
                "games need between 2 and {} players",
                self.max_players
            )));
        }
        let header = Header::new(
            id,
            G::game_type(),
            title,
            num_players,
            PlayerIdentity::new(creator.uid(), creator.name().to_string(), email.to_string()),
            password,
        );
        self.commits().create(G::new_game(header))
    }

    /// Joins the authenticated user to a recruiting game. When the roster
    /// completes, the game starts with turn order drawn from `rng`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the invitation cannot be accepted.
    #[instrument(skip(self, identity, email, secret, rng), fields(uid = %identity.uid()))]
    pub fn accept_invitation<R: Rng + ?Sized>(
        &self,
        game: GameId,
        identity: &Identity,
        email: &str,
        secret: Option<&str>,
        rng: &mut R,
    ) -> Result<G, EngineError> {
        let mut state = self.canonical(game)?;
        let user = PlayerIdentity::new(identity.uid(), identity.name().to_string(), email.to_string());
        let start = state.head_mut().accept_invitation(user, secret).inspect_err(|e| {
            warn!(error = %e, "Invitation rejected");
        })?;
        if start {
            state.head_mut().start(rng)?;
            state.setup()?;
        }

        let state = self.commits().commit(state, identity.uid())?;
        if start {
            self.notify_turn(&state);
        }
        Ok(state)
    }

    /// Removes the authenticated user from a recruiting game.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the game is recruiting and the user joined.
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn drop_user(&self, game: GameId, identity: &Identity) -> Result<G, EngineError> {
        let mut state = self.canonical(game)?;
        state.head_mut().drop_user(identity.uid())?;
        self.commits().commit(state, identity.uid())
    }

    /// Starts a fully recruited game. Admin only.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error for non-admins and a validation error if
    /// the game cannot start.
    #[instrument(skip(self, identity, rng), fields(uid = %identity.uid()))]
    pub fn start_game<R: Rng + ?Sized>(
        &self,
        game: GameId,
        identity: &Identity,
        rng: &mut R,
    ) -> Result<G, EngineError> {
        identity.require_admin()?;
        let mut state = self.canonical(game)?;
        state.head_mut().start(rng)?;
        state.setup()?;
        let state = self.commits().commit(state, identity.uid())?;
        self.notify_turn(&state);
        Ok(state)
    }

    /// Revision stack of `uid` in `game`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the game does not exist.
    pub fn stack(&self, game: GameId, uid: Uid) -> Result<Stack, EngineError> {
        let canonical = self.canonical(game)?;
        CachedViewStore::new(&self.store).stack(game, uid, canonical.head().revision())
    }

    /// Working state of `uid`: the cached snapshot at the user's current
    /// revision, or canonical state when the user is not speculating or the
    /// snapshot is missing.
    ///
    /// Returns the state, the stack to continue from, and the stack as stored.
    fn working(&self, game: GameId, uid: Uid) -> Result<(G, Stack, Stack), EngineError> {
        let canonical = self.canonical(game)?;
        let committed = canonical.head().revision();
        let cache = CachedViewStore::new(&self.store);
        let stored = cache.stack(game, uid, committed)?;
        if !stored.is_speculative() {
            return Ok((canonical, stored, stored));
        }
        match cache.get::<G>(game, uid, stored.current())? {
            Some(snapshot) => {
                debug!(revision = stored.current(), "Using cached snapshot");
                Ok((snapshot, stored, stored))
            }
            None => {
                warn!(revision = stored.current(), "Cached snapshot missing; using canonical state");
                Ok((canonical, Stack::at(committed), stored))
            }
        }
    }

    /// Current working state of the user a request acts as.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error when a non-admin targets another user.
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn current(
        &self,
        game: GameId,
        identity: &Identity,
        target: Option<Uid>,
    ) -> Result<G, EngineError> {
        let uid = identity.act_as(target)?;
        self.working(game, uid).map(|(state, _, _)| state)
    }

    /// Masked canonical view published for the user the request acts as.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error when a non-admin targets another user.
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn view(
        &self,
        game: GameId,
        identity: &Identity,
        target: Option<Uid>,
    ) -> Result<Option<G>, EngineError> {
        let uid = identity.act_as(target)?;
        CommittedStore::new(&self.store).view(game, uid)
    }

    /// Recorded revision numbers of `game`.
    pub fn revisions(&self, game: GameId) -> Result<Vec<u64>, EngineError> {
        RevisionStore::new(&self.store).list(game)
    }

    /// Applies `action` as the user the request acts as.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the game is not running, the user is not
    /// a current player, or the game rejects the action; a transient error if
    /// a concurrent commit or a concurrent move by the same user invalidated
    /// the working state.
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn act(
        &self,
        game: GameId,
        identity: &Identity,
        target: Option<Uid>,
        action: &G::Action,
    ) -> Result<Applied<G>, EngineError> {
        let uid = identity.act_as(target)?;
        let (mut state, mut stack, observed) = self.working(game, uid)?;

        if *state.head().status() != Status::Running {
            return Err(EngineError::validation(format!(
                "game {} is {}",
                game,
                state.head().status()
            )));
        }
        if !state.head().is_current_player(uid) {
            warn!("Action from a player who is not current");
            return Err(EngineError::validation("not current player"));
        }

        let pid = state.head().pid_for(uid);
        let outcome = state.apply(pid, action)?;
        debug!(?outcome, "Action applied");

        match outcome {
            Outcome::Continue => {
                let base = stack.committed();
                stack.update();
                state.head_mut().set_stack(stack);
                let rev = stack.current();
                self.store.transact(|txn| {
                    ensure_canonical::<G>(txn, game, base)?;
                    ensure_stack(txn, game, uid, base, &observed)?;
                    write_snapshot(txn, uid, rev, &state)?;
                    prune_above(txn, game, uid, rev)?;
                    write_stack(txn, game, uid, &stack)
                })?;
                debug!(revision = rev, "Speculative move cached");
                Ok(Applied::Cached { state, stack })
            }
            Outcome::EndTurn { next, new_round } => {
                state.head_mut().set_current_players(next)?;
                state.head_mut().advance_turn(new_round);
                let state = self.commits().commit(state, uid)?;
                self.notify_turn(&state);
                Ok(Applied::Committed { state })
            }
            Outcome::GameOver => {
                let (state, result) =
                    TurnFinalizer::new(&self.store, self.elo, &self.dispatcher).finalize(state, uid)?;
                Ok(Applied::Finalized { state, result })
            }
        }
    }

    /// Applies a stack transition and persists it only when it changed.
    /// Snapshots above the new redo ceiling become unreachable and are
    /// deleted with it.
    fn move_stack(
        &self,
        game: GameId,
        identity: &Identity,
        target: Option<Uid>,
        transition: fn(&mut Stack) -> bool,
    ) -> Result<Option<Stack>, EngineError> {
        let uid = identity.act_as(target)?;
        let canonical = self.canonical(game)?;
        let base = canonical.head().revision();
        let observed = CachedViewStore::new(&self.store).stack(game, uid, base)?;
        let mut stack = observed;
        if !transition(&mut stack) {
            debug!("Stack unchanged; nothing written");
            return Ok(None);
        }
        let pruned = self.store.transact(|txn| {
            ensure_canonical::<G>(txn, game, base)?;
            ensure_stack(txn, game, uid, base, &observed)?;
            write_stack(txn, game, uid, &stack)?;
            prune_above(txn, game, uid, stack.updated())
        })?;
        if pruned > 0 {
            debug!(pruned, "Unreachable snapshots deleted");
        }
        Ok(Some(stack))
    }

    /// Steps the user back one speculative move. Returns `None` when already
    /// at the committed revision.
    ///
    /// # Errors
    ///
    /// Returns storage errors, or unauthorized when targeting another user
    /// without admin rights.
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn undo(
        &self,
        game: GameId,
        identity: &Identity,
        target: Option<Uid>,
    ) -> Result<Option<Stack>, EngineError> {
        self.move_stack(game, identity, target, Stack::undo)
    }

    /// Steps the user forward one undone move. Returns `None` when there is
    /// nothing to redo.
    ///
    /// # Errors
    ///
    /// As for [`GameService::undo`].
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn redo(
        &self,
        game: GameId,
        identity: &Identity,
        target: Option<Uid>,
    ) -> Result<Option<Stack>, EngineError> {
        self.move_stack(game, identity, target, Stack::redo)
    }

    /// Discards all of the user's speculative moves and their snapshots.
    /// Returns `None` when there were none.
    ///
    /// # Errors
    ///
    /// As for [`GameService::undo`].
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn reset(
        &self,
        game: GameId,
        identity: &Identity,
        target: Option<Uid>,
    ) -> Result<Option<Stack>, EngineError> {
        self.move_stack(game, identity, target, Stack::reset)
    }

    fn travel(
        &self,
        game: GameId,
        identity: &Identity,
        target: u64,
        travel: Travel,
    ) -> Result<G, EngineError> {
        identity.require_admin()?;
        let canonical = self.canonical(game)?;
        let state = self.commits().republish::<G>(
            game,
            canonical.head().revision(),
            target,
            travel,
        )?;
        self.notify_turn(&state);
        Ok(state)
    }

    /// Republishes an older revision as canonical. Admin only.
    ///
    /// # Errors
    ///
    /// Unauthorized for non-admins; validation when `target` is not older than
    /// the current revision or was never recorded.
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn rollback(&self, game: GameId, identity: &Identity, target: u64) -> Result<G, EngineError> {
        self.travel(game, identity, target, Travel::Back)
    }

    /// Republishes a newer revision as canonical. Admin only.
    ///
    /// # Errors
    ///
    /// Unauthorized for non-admins; validation ("cannot roll forward any
    /// further") when `target` was never recorded.
    #[instrument(skip(self, identity), fields(uid = %identity.uid()))]
    pub fn rollforward(
        &self,
        game: GameId,
        identity: &Identity,
        target: u64,
    ) -> Result<G, EngineError> {
        self.travel(game, identity, target, Travel::Forward)
    }
}
