//! Common envelope shared by every game type.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use tracing::{debug, info, instrument, warn};

use crate::{EngineError, GameId, Pid, Placements, Stack, Uid};

/// Lifecycle status of a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    /// Waiting for players to accept invitations.
    Recruiting,
    /// In play.
    Running,
    /// Finished normally; placements are recorded.
    Completed,
    /// Left unfinished by its players.
    Abandoned,
    /// Stopped by an administrator.
    Aborted,
}

/// Identity of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct PlayerIdentity {
    uid: Uid,
    name: String,
    email: String,
}

/// Game header: players, status, counters, timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Header {
    id: GameId,
    game_type: String,
    title: String,
    turn: u32,
    round: u32,
    num_players: usize,
    players: Vec<PlayerIdentity>,
    status: Status,
    current_players: Vec<Pid>,
    stack: Stack,
    password_hash: Option<String>,
    placements: Option<Placements>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

/// Hex-encoded SHA-256 digest of an invitation secret.
pub fn hash_secret(secret: &str) -> String {
    Sha256::digest(secret.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl Header {
    /// Creates a recruiting game with the creator as its first player.
    #[instrument(skip_all, fields(game_id = %id, creator = %creator.uid))]
    pub fn new(
        id: GameId,
        game_type: impl Into<String>,
        title: impl Into<String>,
        num_players: usize,
        creator: PlayerIdentity,
        password: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            game_type: game_type.into(),
            title: title.into(),
            turn: 0,
            round: 0,
            num_players,
            players: vec![creator],
            status: Status::Recruiting,
            current_players: Vec::new(),
            stack: Stack::default(),
            password_hash: password.filter(|p| !p.is_empty()).map(hash_secret),
            placements: None,
            created_at: now,
            started_at: None,
            updated_at: now,
            ended_at: None,
        }
    }

    /// Canonical revision of the state this header belongs to.
    pub fn revision(&self) -> u64 {
        self.stack.committed()
    }

    /// Mutable access to the embedded revision stack.
    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    /// Replaces the embedded revision stack.
    pub fn set_stack(&mut self, stack: Stack) {
        self.stack = stack;
    }

    /// Whether joining requires a secret.
    pub fn is_private(&self) -> bool {
        self.password_hash.is_some()
    }

    /// User ids of every participant, in player order.
    pub fn uids(&self) -> Vec<Uid> {
        self.players.iter().map(|p| p.uid).collect()
    }

    /// Player id of `uid`, or [`Pid::NONE`] if the user has not joined.
    pub fn pid_for(&self, uid: Uid) -> Pid {
        self.players
            .iter()
            .position(|p| p.uid == uid)
            .map(Pid::from_index)
            .unwrap_or(Pid::NONE)
    }

    /// Participant at player id `pid`.
    pub fn player(&self, pid: Pid) -> Option<&PlayerIdentity> {
        pid.index().and_then(|i| self.players.get(i))
    }

    /// User id of the player at `pid`.
    pub fn uid_for(&self, pid: Pid) -> Option<Uid> {
        self.player(pid).map(|p| p.uid)
    }

    /// Whether `uid` has joined this game.
    pub fn has_user(&self, uid: Uid) -> bool {
        !self.pid_for(uid).is_none()
    }

    /// User ids of the players who act next.
    pub fn current_uids(&self) -> Vec<Uid> {
        self.current_players
            .iter()
            .filter_map(|pid| self.uid_for(*pid))
            .collect()
    }

    /// Whether `uid` is among the players who act next.
    pub fn is_current_player(&self, uid: Uid) -> bool {
        let pid = self.pid_for(uid);
        !pid.is_none() && self.current_players.contains(&pid)
    }

    /// Sets the players who act next.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any player id is out of bounds.
    pub fn set_current_players(&mut self, pids: Vec<Pid>) -> Result<(), EngineError> {
        if let Some(bad) = pids.iter().find(|pid| self.player(**pid).is_none()) {
            return Err(EngineError::validation(format!(
                "player id {} is out of range",
                bad
            )));
        }
        self.current_players = pids;
        Ok(())
    }

    /// Advances the turn counter, and the round counter when `new_round`.
    pub fn advance_turn(&mut self, new_round: bool) {
        self.turn += 1;
        if new_round {
            self.round += 1;
        }
    }

    /// Stamps the last-update time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Adds a participant.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the user already joined or the roster is full.
    #[instrument(skip(self, user), fields(game_id = %self.id, uid = %user.uid))]
    pub fn add_user(&mut self, user: PlayerIdentity) -> Result<(), EngineError> {
        if self.has_user(user.uid) {
            return Err(EngineError::validation(format!(
                "{} has already joined game {}",
                user.name, self.id
            )));
        }
        if self.players.len() >= self.num_players {
            return Err(EngineError::validation(format!(
                "game {} already has {} players",
                self.id, self.num_players
            )));
        }
        self.players.push(user);
        Ok(())
    }

    /// Removes a participant.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the user has not joined.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub fn remove_user(&mut self, uid: Uid) -> Result<PlayerIdentity, EngineError> {
        let index = self
            .pid_for(uid)
            .index()
            .ok_or_else(|| EngineError::validation(format!("user {} has not joined", uid)))?;
        Ok(self.players.remove(index))
    }

    /// Joins `user` to a recruiting game.
    ///
    /// Returns `true` when this join completes the roster and the game should
    /// start.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the game is full or not recruiting,
    /// the user already joined, or the secret does not match.
    #[instrument(skip(self, user, secret), fields(game_id = %self.id, uid = %user.uid))]
    pub fn accept_invitation(
        &mut self,
        user: PlayerIdentity,
        secret: Option<&str>,
    ) -> Result<bool, EngineError> {
        if self.status != Status::Recruiting {
            return Err(EngineError::validation(format!(
                "game {} is not recruiting",
                self.id
            )));
        }
        if self.players.len() >= self.num_players {
            return Err(EngineError::validation(format!(
                "game {} already has the maximum number of players",
                self.id
            )));
        }
        if self.has_user(user.uid) {
            return Err(EngineError::validation(format!(
                "{} has already joined game {}",
                user.name, self.id
            )));
        }
        if let Some(expected) = &self.password_hash {
            let supplied = secret.map(hash_secret);
            if supplied.as_deref() != Some(expected.as_str()) {
                warn!("Invitation secret mismatch");
                return Err(EngineError::validation("incorrect password"));
            }
        }

        self.add_user(user)?;
        let start = self.players.len() == self.num_players;
        debug!(joined = self.players.len(), start, "Invitation accepted");
        Ok(start)
    }

    /// Removes `uid` from a recruiting game.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the game is recruiting and the user joined.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub fn drop_user(&mut self, uid: Uid) -> Result<(), EngineError> {
        if self.status != Status::Recruiting {
            return Err(EngineError::validation(format!(
                "cannot drop from game {} once it has left recruiting",
                self.id
            )));
        }
        self.remove_user(uid)?;
        Ok(())
    }

    /// Starts a fully recruited game: shuffles turn order with `rng`, makes
    /// the first player current and resets counters.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the game is not recruiting or the roster
    /// is incomplete.
    #[instrument(skip(self, rng), fields(game_id = %self.id))]
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), EngineError> {
        if self.status != Status::Recruiting {
            return Err(EngineError::validation(format!(
                "game {} has already started",
                self.id
            )));
        }
        if self.players.len() != self.num_players {
            return Err(EngineError::validation(format!(
                "game {} has {} of {} players",
                self.id,
                self.players.len(),
                self.num_players
            )));
        }

        self.players.shuffle(rng);
        let now = Utc::now();
        self.status = Status::Running;
        self.turn = 1;
        self.round = 1;
        self.current_players = vec![Pid::from_index(0)];
        self.started_at = Some(now);
        self.updated_at = now;
        info!(order = ?self.uids(), "Game started");
        Ok(())
    }

    /// Marks the game completed with its final placements.
    pub fn complete(&mut self, placements: Placements, now: DateTime<Utc>) {
        self.status = Status::Completed;
        self.placements = Some(placements);
        self.current_players.clear();
        self.ended_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(uid: i64) -> PlayerIdentity {
        PlayerIdentity::new(Uid(uid), format!("user{}", uid), format!("u{}@example.com", uid))
    }

    #[test]
    fn test_remove_missing_user_leaves_roster_untouched() {
        let mut header = Header::new(GameId(1), "tally", "t", 3, player(1), None);
        header.add_user(player(2)).unwrap();
        let before = header.players().clone();
        assert!(header.remove_user(Uid(7)).is_err());
        assert_eq!(header.players(), &before);
    }

    #[test]
    fn test_hash_secret_is_stable_hex() {
        let digest = hash_secret("open sesame");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_secret("open sesame"));
        assert_ne!(digest, hash_secret("open sesame!"));
    }
}
