//! Per (game, user) revision stack.
//!
//! The stack tracks three counters: the last canonical revision the user
//! acknowledged (`committed`), the revision the user is looking at
//! (`current`), and the redo ceiling (`updated`). Every transition keeps
//! `committed <= current <= updated`.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Three-counter speculative revision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Stack {
    committed: u64,
    current: u64,
    updated: u64,
}

impl Stack {
    /// A stack with all three counters at `committed`.
    pub fn at(committed: u64) -> Self {
        Self {
            committed,
            current: committed,
            updated: committed,
        }
    }

    /// Last canonical revision acknowledged.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// Revision the user is presently viewing.
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Highest revision produced for this user.
    pub fn updated(&self) -> u64 {
        self.updated
    }

    /// Whether the user is viewing a speculative (uncommitted) revision.
    pub fn is_speculative(&self) -> bool {
        self.current != self.committed
    }

    /// Whether the stack equals its zero-equivalent.
    pub fn is_clear(&self) -> bool {
        self.current == self.committed && self.updated == self.committed
    }

    /// Records a new speculative move. Discards any redo history.
    #[instrument(level = "debug")]
    pub fn update(&mut self) {
        self.current += 1;
        self.updated = self.current;
    }

    /// Steps back one speculative revision. Returns whether anything changed.
    #[instrument(level = "debug")]
    pub fn undo(&mut self) -> bool {
        if self.current > self.committed {
            self.current -= 1;
            true
        } else {
            debug!("Undo at committed boundary is a no-op");
            false
        }
    }

    /// Steps forward one speculative revision. Returns whether anything changed.
    #[instrument(level = "debug")]
    pub fn redo(&mut self) -> bool {
        if self.updated > self.committed && self.current < self.updated {
            self.current += 1;
            true
        } else {
            debug!("Redo at update ceiling is a no-op");
            false
        }
    }

    /// Drops all speculative revisions. Returns whether anything changed.
    #[instrument(level = "debug")]
    pub fn reset(&mut self) -> bool {
        if self.is_clear() {
            return false;
        }
        self.current = self.committed;
        self.updated = self.committed;
        true
    }

    /// Canonicalizes: bumps the committed revision and clears speculation.
    #[instrument(level = "debug")]
    pub fn commit(&mut self) {
        self.committed += 1;
        self.current = self.committed;
        self.updated = self.committed;
    }
}
