//! Best-effort notification dispatch.
//!
//! Notifications go out only after a successful commit and run as detached
//! tasks: the request path never waits on delivery, and delivery errors are
//! logged, never returned.

use std::sync::Arc;

use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{GameId, Placements, Uid};

/// Message sent to participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The recipients act next.
    YourTurn {
        /// Game awaiting a move.
        game_id: GameId,
        /// Game title.
        title: String,
    },
    /// The game finished.
    GameOver {
        /// Finished game.
        game_id: GameId,
        /// Game title.
        title: String,
        /// Final placements.
        placements: Placements,
    },
}

/// Delivery failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Notify error: {} at {}:{}", message, file, line)]
pub struct NotifyError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl NotifyError {
    /// Creates a new notification error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Delivery backend (email, push, ...).
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Delivers `notification` to `recipients`.
    async fn notify(
        &self,
        recipients: &[Uid],
        notification: &Notification,
    ) -> Result<(), NotifyError>;
}

/// Spawns notifications as detached tasks.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    handle: Option<Handle>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("enabled", &self.notifier.is_some())
            .field("has_runtime", &self.handle.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Dispatches through `notifier` on the current tokio runtime.
    ///
    /// Outside a runtime, notifications are dropped with a warning.
    #[instrument(skip(notifier))]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        let handle = Handle::try_current().ok();
        if handle.is_none() {
            warn!("No tokio runtime; notifications will be dropped");
        }
        Self {
            notifier: Some(notifier),
            handle,
        }
    }

    /// Dispatches through `notifier` on `handle`.
    pub fn with_handle(notifier: Arc<dyn Notifier>, handle: Handle) -> Self {
        Self {
            notifier: Some(notifier),
            handle: Some(handle),
        }
    }

    /// A dispatcher that sends nothing.
    pub fn disabled() -> Self {
        Self {
            notifier: None,
            handle: None,
        }
    }

    /// Sends `notification` to `recipients` in the background.
    ///
    /// Returns the task handle, or `None` when nothing was spawned. Callers on
    /// the request path drop the handle.
    #[instrument(skip(self, notification), fields(recipients = recipients.len()))]
    pub fn dispatch(
        &self,
        recipients: Vec<Uid>,
        notification: Notification,
    ) -> Option<JoinHandle<()>> {
        let (notifier, handle) = match (&self.notifier, &self.handle) {
            (Some(notifier), Some(handle)) => (Arc::clone(notifier), handle),
            _ => {
                debug!("Notification skipped");
                return None;
            }
        };
        if recipients.is_empty() {
            return None;
        }

        Some(handle.spawn(async move {
            match notifier.notify(&recipients, &notification).await {
                Ok(()) => info!(?recipients, "Notification delivered"),
                Err(e) => warn!(?recipients, error = %e, "Notification delivery failed"),
            }
        }))
    }
}
