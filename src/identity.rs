//! User, player and game identifiers, plus the authenticated request identity.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::EngineError;

/// Persistent user identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Uid(pub i64);

/// Stable game identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub i64);

/// Transient in-game player index.
///
/// Player ids are 1-based; `Pid::NONE` (0) means "no player". Use
/// [`Pid::index`] and [`Pid::from_index`] to move between player ids and
/// positions in the header's player list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pid(pub usize);

impl Pid {
    /// The reserved "no player" id.
    pub const NONE: Pid = Pid(0);

    /// Converts a 0-based position in the player list into a player id.
    pub fn from_index(index: usize) -> Self {
        Pid(index + 1)
    }

    /// Converts this player id into a 0-based list position.
    ///
    /// Returns `None` for [`Pid::NONE`].
    pub fn index(self) -> Option<usize> {
        self.0.checked_sub(1)
    }

    /// Whether this is the reserved "no player" id.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Authenticated identity supplied by the auth provider for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    uid: Uid,
    name: String,
    admin: bool,
}

impl Identity {
    /// Creates a regular (non-admin) identity.
    pub fn new(uid: Uid, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            admin: false,
        }
    }

    /// Creates an identity carrying the admin capability.
    pub fn admin(uid: Uid, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            admin: true,
        }
    }

    /// The authenticated user id.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// The authenticated user's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this identity holds the admin capability.
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Resolves the user this request acts as.
    ///
    /// Acting as anyone other than oneself requires the admin capability.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error when a non-admin names another user.
    #[instrument(skip(self), fields(uid = %self.uid, admin = self.admin))]
    pub fn act_as(&self, target: Option<Uid>) -> Result<Uid, EngineError> {
        match target {
            None => Ok(self.uid),
            Some(target) if target == self.uid => Ok(target),
            Some(target) if self.admin => Ok(target),
            Some(target) => {
                warn!(%target, "Non-admin attempted to act as another user");
                Err(EngineError::unauthorized(format!(
                    "user {} may not act as user {}",
                    self.uid, target
                )))
            }
        }
    }

    /// Fails unless this identity holds the admin capability.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error for non-admins.
    pub fn require_admin(&self) -> Result<(), EngineError> {
        if self.admin {
            Ok(())
        } else {
            Err(EngineError::unauthorized(format!(
                "user {} is not an admin",
                self.uid
            )))
        }
    }
}
