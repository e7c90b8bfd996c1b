//! Core error type shared by every engine component.

use derive_more::{Display, Error};
use strum::Display as StrumDisplay;

/// Category of an [`EngineError`].
///
/// The category decides how a caller reacts: only [`EngineErrorKind::Transient`]
/// is eligible for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum EngineErrorKind {
    /// User-correctable request problem (not current player, wrong password, ...).
    Validation,
    /// A document the caller asked for does not exist.
    NotFound,
    /// Storage timeout or transaction conflict.
    Transient,
    /// Admin-only operation attempted without admin rights.
    Unauthorized,
    /// Serialization failures and other programmer errors.
    Internal,
}

/// Engine error with kind and location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("{} error: {} at {}:{}", kind, message, file, line)]
pub struct EngineError {
    /// Error category.
    pub kind: EngineErrorKind,
    /// Human-readable cause, surfaced to callers verbatim.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl EngineError {
    /// Creates a new error of the given kind with caller location tracking.
    #[track_caller]
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Creates a validation error.
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Validation, message)
    }

    /// Creates a not-found error.
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::NotFound, message)
    }

    /// Creates a transient (retry-eligible) error.
    #[track_caller]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Transient, message)
    }

    /// Creates an authorization error.
    #[track_caller]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unauthorized, message)
    }

    /// Creates an internal error.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Internal, message)
    }

    /// Returns the error category.
    pub fn kind(&self) -> EngineErrorKind {
        self.kind
    }

    /// Returns the human-readable cause.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the caller may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        self.kind == EngineErrorKind::Transient
    }

    /// Whether this is a validation error.
    pub fn is_validation(&self) -> bool {
        self.kind == EngineErrorKind::Validation
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.kind == EngineErrorKind::NotFound
    }
}

impl From<serde_json::Error> for EngineError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("Document encoding error: {}", err))
    }
}
