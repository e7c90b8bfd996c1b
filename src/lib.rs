//! Turnstack - revision, cache and commit engine for turn-based board games.
//!
//! Each player can speculatively advance a game (and undo or redo their own
//! pending moves) without touching the canonical record other players see.
//! When a turn legitimately ends, a new canonical revision is published
//! atomically; when the game ends, placements, Elo ratings and lifetime
//! statistics are recorded with the terminal state.
//!
//! # Architecture
//!
//! - **Header / Stack**: common game envelope and the per-user revision stack
//! - **Store**: abstract transactional document store (in-memory or SQLite)
//! - **CommitCoordinator**: atomic canonical publication, rollback, rollforward
//! - **Placements / EloEngine / UStat**: end-of-game scoring
//! - **TurnFinalizer**: sequences end-of-game work in one transaction
//! - **GameService**: routes actions down the cache, commit or finalize path
//!
//! # Example
//!
//! ```no_run
//! use turnstack::games::tally::{Tally, TallyAction};
//! use turnstack::{Dispatcher, EngineConfig, GameId, GameService, Identity, MemoryStore, Uid};
//!
//! # fn example() -> Result<(), turnstack::EngineError> {
//! let service: GameService<MemoryStore, Tally> =
//!     GameService::new(MemoryStore::new(), &EngineConfig::default(), Dispatcher::disabled());
//!
//! let ann = Identity::new(Uid(1), "ann");
//! let bob = Identity::new(Uid(2), "bob");
//! service.create_game(GameId(1), &ann, "ann@example.com", "Friday", 2, None)?;
//! let game = service.accept_invitation(GameId(1), &bob, "bob@example.com", None, &mut rand::thread_rng())?;
//!
//! let first = turnstack::Game::head(&game).current_uids()[0];
//! let player = if first == ann.uid() { &ann } else { &bob };
//! service.act(GameId(1), player, None, &TallyAction::Add(3))?;
//! service.undo(GameId(1), player, None)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod commit;
mod config;
mod db;
mod elo;
mod error;
mod finalize;
mod game;
mod header;
mod identity;
mod notify;
mod placement;
mod service;
mod stack;
mod ustat;

// Storage accessors and document store implementations
pub mod store;

// Bundled game plugins
pub mod games;

// Crate-level exports - Errors
pub use error::{EngineError, EngineErrorKind};

// Crate-level exports - Identity and game envelope
pub use header::{Header, PlayerIdentity, Status, hash_secret};
pub use identity::{GameId, Identity, Pid, Uid};
pub use stack::Stack;

// Crate-level exports - Game plugin capability set
pub use game::{Game, Outcome, Scorecard};

// Crate-level exports - Persistence
pub use db::{DbError, Document, MIGRATIONS, NewDocument, SqliteStore};
pub use store::MemoryStore;

// Crate-level exports - Commit and finalization
pub use commit::{CommitCoordinator, Travel};
pub use elo::{EloEngine, EloEntry, EloRecord};
pub use finalize::{GameResult, TurnFinalizer};
pub use placement::Placements;
pub use ustat::{ALL_COUNTS, StatBucket, UStat};

// Crate-level exports - Notifications
pub use notify::{Dispatcher, Notification, Notifier, NotifyError};

// Crate-level exports - Configuration
pub use config::{ConfigError, EloConfig, EngineConfig};

// Crate-level exports - Service layer
pub use service::{Applied, GameService};
