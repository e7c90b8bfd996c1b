//! Database row models.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::db::schema;

/// Stored document row.
#[derive(Debug, Clone, Queryable, Selectable, Getters)]
#[diesel(table_name = schema::documents)]
pub struct Document {
    collection: String,
    doc_key: String,
    body: String,
    updated_at: NaiveDateTime,
}

/// Insertable document row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::documents)]
pub struct NewDocument {
    collection: String,
    doc_key: String,
    body: String,
    updated_at: NaiveDateTime,
}
