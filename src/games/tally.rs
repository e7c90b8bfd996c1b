//! Tally: a small push-your-luck game.
//!
//! On their turn a player adds dice-sized amounts to a pending pot, then
//! banks it into their score or passes and loses it. Each player may set
//! aside one hidden reserve that only they can see until the game ends. The
//! game lasts a fixed number of rounds.

use chrono::Utc;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{EngineError, Game, Header, Outcome, Pid, Scorecard, Uid};

/// Rounds played before the game ends.
pub const ROUNDS: u32 = 3;

/// Largest single addition.
pub const MAX_ADD: u32 = 6;

/// Per-player board state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct TallyPlayer {
    score: i64,
    reserve: Option<u32>,
    moves: u32,
    think_secs: u64,
}

/// Tally actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TallyAction {
    /// Add 1 to 6 points to the pending pot.
    Add(u32),
    /// Set aside a hidden reserve, once per game.
    Reserve(u32),
    /// Bank the pot and end the turn.
    Bank,
    /// Drop the pot and end the turn.
    Pass,
}

/// Full game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Tally {
    header: Header,
    players: Vec<TallyPlayer>,
    pending: i64,
}

impl Tally {
    fn player_mut(&mut self, pid: Pid) -> Result<&mut TallyPlayer, EngineError> {
        pid.index()
            .and_then(|i| self.players.get_mut(i))
            .ok_or_else(|| EngineError::validation(format!("no player {}", pid)))
    }

    fn end_turn(&mut self, actor: Pid) -> Result<Outcome, EngineError> {
        let elapsed = (Utc::now() - *self.header.updated_at()).num_seconds().max(0) as u64;
        self.player_mut(actor)?.think_secs += elapsed;
        self.pending = 0;

        let count = self.players.len();
        let next = Pid(actor.0 % count + 1);
        let new_round = next == Pid(1);
        if new_round && *self.header.round() >= ROUNDS {
            debug!("Final round complete");
            return Ok(Outcome::GameOver);
        }
        Ok(Outcome::EndTurn {
            next: vec![next],
            new_round,
        })
    }
}

impl Game for Tally {
    type Action = TallyAction;

    fn game_type() -> &'static str {
        "tally"
    }

    fn head(&self) -> &Header {
        &self.header
    }

    fn head_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn new_game(header: Header) -> Self {
        Self {
            header,
            players: Vec::new(),
            pending: 0,
        }
    }

    fn setup(&mut self) -> Result<(), EngineError> {
        self.players = vec![TallyPlayer::default(); self.header.players().len()];
        self.pending = 0;
        Ok(())
    }

    fn views(&self) -> (Vec<Uid>, Vec<Self>) {
        let uids = self.header.uids();
        let views = uids
            .iter()
            .map(|uid| {
                let own = self.header.pid_for(*uid).index();
                let mut view = self.clone();
                for (i, player) in view.players.iter_mut().enumerate() {
                    if Some(i) != own {
                        player.reserve = None;
                    }
                }
                view
            })
            .collect();
        (uids, views)
    }

    #[instrument(skip(self), fields(game_id = %self.header.id()))]
    fn apply(&mut self, actor: Pid, action: &TallyAction) -> Result<Outcome, EngineError> {
        match *action {
            TallyAction::Add(points) => {
                if !(1..=MAX_ADD).contains(&points) {
                    return Err(EngineError::validation(format!(
                        "can add between 1 and {} points",
                        MAX_ADD
                    )));
                }
                self.player_mut(actor)?.moves += 1;
                self.pending += i64::from(points);
                Ok(Outcome::Continue)
            }
            TallyAction::Reserve(points) => {
                let player = self.player_mut(actor)?;
                if player.reserve.is_some() {
                    return Err(EngineError::validation("reserve already set"));
                }
                player.reserve = Some(points.min(MAX_ADD));
                player.moves += 1;
                Ok(Outcome::Continue)
            }
            TallyAction::Bank => {
                let pending = self.pending;
                let player = self.player_mut(actor)?;
                player.score += pending;
                player.moves += 1;
                self.end_turn(actor)
            }
            TallyAction::Pass => {
                self.player_mut(actor)?.moves += 1;
                self.end_turn(actor)
            }
        }
    }

    fn scorecards(&self) -> Vec<Scorecard> {
        self.header
            .uids()
            .into_iter()
            .zip(&self.players)
            .map(|(uid, p)| {
                let total = p.score + i64::from(p.reserve.unwrap_or(0));
                Scorecard::new(uid, total, p.moves, p.think_secs)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameId, PlayerIdentity};
    use rand::SeedableRng;

    fn started(players: usize) -> Tally {
        let mut header = Header::new(
            GameId(1),
            "tally",
            "test",
            players,
            PlayerIdentity::new(Uid(1), "p1".into(), "p1@example.com".into()),
            None,
        );
        for uid in 2..=players as i64 {
            header
                .add_user(PlayerIdentity::new(Uid(uid), format!("p{}", uid), String::new()))
                .unwrap();
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        header.start(&mut rng).unwrap();
        let mut game = Tally::new_game(header);
        game.setup().unwrap();
        game
    }

    #[test]
    fn test_add_continues_and_bank_passes_turn() {
        let mut game = started(2);
        assert_eq!(game.apply(Pid(1), &TallyAction::Add(4)).unwrap(), Outcome::Continue);
        let outcome = game.apply(Pid(1), &TallyAction::Bank).unwrap();
        assert_eq!(
            outcome,
            Outcome::EndTurn {
                next: vec![Pid(2)],
                new_round: false
            }
        );
        assert_eq!(*game.players()[0].score(), 4);
        assert_eq!(*game.pending(), 0);
    }

    #[test]
    fn test_add_out_of_range_is_rejected() {
        let mut game = started(2);
        let err = game.apply(Pid(1), &TallyAction::Add(7)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_views_hide_other_reserves() {
        let mut game = started(2);
        game.apply(Pid(1), &TallyAction::Reserve(5)).unwrap();
        let (uids, views) = game.views();
        let own = game.head().pid_for(uids[0]).index().unwrap();
        assert_eq!(*views[0].players()[own].reserve(), Some(5));
        let other = game.head().pid_for(uids[1]).index().unwrap();
        assert_eq!(*views[1].players()[own].reserve(), None);
        assert_ne!(own, other);
    }

    #[test]
    fn test_last_player_of_final_round_ends_game() {
        let mut game = started(2);
        game.header.advance_turn(true);
        game.header.advance_turn(true);
        assert_eq!(*game.head().round(), ROUNDS);
        game.apply(Pid(1), &TallyAction::Pass).unwrap();
        assert_eq!(game.apply(Pid(2), &TallyAction::Pass).unwrap(), Outcome::GameOver);
    }
}
