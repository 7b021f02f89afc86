//! Database handle, schema and column codecs.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::StorageError;

/// Date-only columns (e.g. `last_contact_date`) use this format.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Shared handle over a single SQLite connection.
///
/// The connection sits behind a mutex so one handle can serve every request
/// handler via an `Arc`. On-disk databases run in WAL mode; foreign keys are
/// enforced on every connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!(path = %path.as_ref().display(), "opened research desk database");
        Self::initialize(conn)
    }

    /// Open a private in-memory database. Used by tests and ephemeral tooling.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

fn apply_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS stocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            ticker TEXT NOT NULL UNIQUE,
            sector TEXT,
            description TEXT,
            notes TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            price REAL,
            market_cap INTEGER,
            metadata TEXT NOT NULL DEFAULT '{}',
            thesis_analysis TEXT,
            embedding BLOB,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            company TEXT,
            job_title TEXT,
            bio TEXT,
            investor_type TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            investment_focus TEXT NOT NULL DEFAULT '[]',
            location TEXT,
            last_contact_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            notes TEXT,
            embedding BLOB,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Sync-list link tables; replaced wholesale when a member's lists change.
    for table in ["member_originated_stocks", "member_commented_stocks"] {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                    stock_id INTEGER NOT NULL REFERENCES stocks(id) ON DELETE CASCADE,
                    note TEXT,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (member_id, stock_id)
                )"
            ),
            [],
        )?;
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_stocks_sector ON stocks(sector)",
        "CREATE INDEX IF NOT EXISTS idx_members_investor_type ON members(investor_type)",
    ];
    for index_sql in indexes {
        conn.execute(index_sql, [])?;
    }

    debug!("database schema applied");
    Ok(())
}

/// Encode an embedding as little-endian f32 bytes for BLOB storage.
pub fn vector_to_blob(values: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(values.len() * 4);
    for &val in values {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Decode a BLOB column back into an embedding vector.
pub fn blob_to_vector(blob: &[u8]) -> Result<Vec<f32>, StorageError> {
    if blob.len() % 4 != 0 {
        return Err(StorageError::Serialization(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    let mut values = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        values.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(values)
}

/// Escape `%`, `_` and backslash so user input matches literally inside a
/// LIKE pattern (queries pass `ESCAPE '\'`).
pub(crate) fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, col: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|e| column_decode_err(row, col, e))
}

pub(crate) fn opt_json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    col: &str,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(col)?;
    match raw {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| column_decode_err(row, col, e)),
        None => Ok(None),
    }
}

pub(crate) fn datetime_column(row: &Row<'_>, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| column_decode_err(row, col, e))
}

pub(crate) fn opt_date_column(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(col)?;
    raw.map(|text| {
        NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| column_decode_err(row, col, e))
    })
    .transpose()
}

pub(crate) fn embedding_column(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<Vec<f32>>> {
    let raw: Option<Vec<u8>> = row.get(col)?;
    match raw {
        Some(blob) => blob_to_vector(&blob)
            .map(Some)
            .map_err(|e| column_decode_err(row, col, e)),
        None => Ok(None),
    }
}

fn column_decode_err(
    row: &Row<'_>,
    col: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    let index = row.as_ref().column_index(col).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}
