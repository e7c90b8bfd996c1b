//! SQLite persistence for the document store.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::DbError;
pub use models::{Document, NewDocument};
pub use repository::{MIGRATIONS, SqliteStore};
