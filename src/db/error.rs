//! Database error types.

use derive_more::{Display, Error};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::EngineError;

/// Database error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Database error: {} at {}:{}", message, file, line)]
pub struct DbError {
    /// Error message.
    pub message: String,
    /// Whether the failure was a lock timeout or conflict worth retrying.
    pub transient: bool,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DbError {
    /// Creates a new database error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            transient: false,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Creates a retry-eligible database error.
    #[track_caller]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            transient: true,
            ..Self::new(message)
        }
    }
}

/// SQLITE_BUSY and SQLITE_LOCKED messages. SQLite reports lock timeouts as
/// untyped errors, so the message is all there is to go on.
const LOCKED_MESSAGES: [&str; 3] = [
    "database is locked",
    "database table is locked",
    "database schema is locked",
];

fn is_busy(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    LOCKED_MESSAGES.iter().any(|locked| message.contains(locked))
}

impl From<DieselError> for DbError {
    #[track_caller]
    fn from(err: DieselError) -> Self {
        match &err {
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                Self::transient(format!("Serialization conflict: {}", err))
            }
            DieselError::DatabaseError(_, info) if is_busy(info.message()) => {
                Self::transient(format!("Database busy: {}", err))
            }
            _ => Self::new(format!("Diesel error: {}", err)),
        }
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(format!("Connection error: {}", err))
    }
}

impl From<DbError> for EngineError {
    #[track_caller]
    fn from(err: DbError) -> Self {
        if err.transient {
            EngineError::transient(err.message)
        } else {
            EngineError::internal(err.message)
        }
    }
}

impl From<DieselError> for EngineError {
    #[track_caller]
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => EngineError::not_found("document not found"),
            err => DbError::from(err).into(),
        }
    }
}
