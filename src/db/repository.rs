//! SQLite-backed document store.

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};

use crate::db::{DbError, Document, NewDocument, schema};
use crate::store::{Collection, DocKey, DocumentStore, Txn};
use crate::EngineError;

/// Schema migrations bundled with the crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Document store persisted in one SQLite `documents` table.
///
/// Each operation opens its own connection, so an in-memory path
/// (`":memory:"`) would lose data between calls; use a file path.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: String,
    busy_timeout_ms: u64,
}

impl SqliteStore {
    /// Creates a store for the database at `db_path`.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String, busy_timeout_ms: u64) -> Self {
        info!(path = %db_path, busy_timeout_ms, "Creating SqliteStore");
        Self {
            db_path,
            busy_timeout_ms,
        }
    }

    /// Database path.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened or a migration fails.
    #[instrument(skip(self))]
    pub fn migrate(&self) -> Result<usize, DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migrations failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(applied.len())
    }

    /// Establishes a database connection with the configured busy timeout.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", self.busy_timeout_ms))?;
        Ok(conn)
    }
}

fn get_body(conn: &mut SqliteConnection, key: &DocKey) -> Result<Option<String>, DbError> {
    use schema::documents::dsl;
    Ok(dsl::documents
        .filter(dsl::collection.eq(key.collection().as_ref()))
        .filter(dsl::doc_key.eq(key.key()))
        .select(dsl::body)
        .first::<String>(conn)
        .optional()?)
}

fn scan_bodies(
    conn: &mut SqliteConnection,
    collection: Collection,
    prefix: &str,
) -> Result<Vec<(DocKey, String)>, DbError> {
    use schema::documents::dsl;
    let rows = dsl::documents
        .filter(dsl::collection.eq(collection.as_ref()))
        .filter(dsl::doc_key.like(format!("{}%", prefix)))
        .order(dsl::doc_key.asc())
        .select(Document::as_select())
        .load::<Document>(conn)?;
    Ok(rows
        .into_iter()
        .map(|doc| (DocKey::new(collection, doc.doc_key().clone()), doc.body().clone()))
        .collect())
}

struct SqliteTxn<'a> {
    conn: &'a mut SqliteConnection,
}

impl Txn for SqliteTxn<'_> {
    fn get(&mut self, key: &DocKey) -> Result<Option<String>, EngineError> {
        Ok(get_body(&mut *self.conn, key)?)
    }

    fn put(&mut self, key: &DocKey, body: String) -> Result<(), EngineError> {
        let row = NewDocument::new(
            key.collection().to_string(),
            key.key().to_string(),
            body,
            Utc::now().naive_utc(),
        );
        diesel::replace_into(schema::documents::table)
            .values(&row)
            .execute(&mut *self.conn)?;
        Ok(())
    }

    fn delete(&mut self, key: &DocKey) -> Result<bool, EngineError> {
        use schema::documents::dsl;
        let removed = diesel::delete(
            dsl::documents
                .filter(dsl::collection.eq(key.collection().as_ref()))
                .filter(dsl::doc_key.eq(key.key())),
        )
        .execute(&mut *self.conn)?;
        Ok(removed > 0)
    }

    fn scan(
        &mut self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError> {
        Ok(scan_bodies(&mut *self.conn, collection, prefix)?)
    }
}

impl DocumentStore for SqliteStore {
    #[instrument(skip(self), fields(collection = %key.collection(), key = key.key()))]
    fn get(&self, key: &DocKey) -> Result<Option<String>, EngineError> {
        let mut conn = self.connection()?;
        Ok(get_body(&mut conn, key)?)
    }

    #[instrument(skip(self))]
    fn scan(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError> {
        let mut conn = self.connection()?;
        Ok(scan_bodies(&mut conn, collection, prefix)?)
    }

    fn transact<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn Txn) -> Result<T, EngineError>,
    {
        let mut conn = self.connection()?;
        // Write lock is taken up front; racing commits wait on busy_timeout.
        conn.immediate_transaction(|conn| f(&mut SqliteTxn { conn }))
    }
}
