//! Capability set every game-type plugin implements.
//!
//! The engine is generic over [`Game`] only. It never inspects board fields;
//! it reads the [`Header`], asks the game for per-player masked views and
//! final scorecards, and routes the [`Outcome`] of each action.

use std::fmt::Debug;

use derive_getters::Getters;
use derive_new::new;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Header, Pid, Uid};

/// What an applied action means for turn flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The acting player keeps the turn; the result is cached speculatively.
    Continue,
    /// The turn ends; `next` players act next.
    EndTurn {
        /// Players who act next.
        next: Vec<Pid>,
        /// Whether this turn boundary also starts a new round.
        new_round: bool,
    },
    /// Nobody remains to act; the game is over.
    GameOver,
}

/// Final tally for one participant, fed to placement and statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct Scorecard {
    uid: Uid,
    score: i64,
    moves: u32,
    think_secs: u64,
}

/// A game-type plugin.
pub trait Game: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// A named action with its parameters.
    type Action: Debug;

    /// Game-type tag stored in the header.
    fn game_type() -> &'static str;

    /// The common header.
    fn head(&self) -> &Header;

    /// Mutable access to the common header.
    fn head_mut(&mut self) -> &mut Header;

    /// Fresh game state around `header`.
    fn new_game(header: Header) -> Self;

    /// Builds the initial board once the header has started and the turn
    /// order is fixed.
    fn setup(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Per-participant views with hidden information masked, as parallel
    /// vectors of user ids and states.
    fn views(&self) -> (Vec<Uid>, Vec<Self>);

    /// Applies `action` for `actor`.
    fn apply(&mut self, actor: Pid, action: &Self::Action) -> Result<Outcome, EngineError>;

    /// Final scorecards for every participant.
    fn scorecards(&self) -> Vec<Scorecard>;
}
