#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `SQLite` connection, schema bootstrap, and queries for the relief map.
//!
//! Uses `switchy_database` for all database operations. Incident and
//! principal documents live in a single `SQLite` file (the stand-in for
//! the original deployment's managed document store), created on first
//! open.

pub mod queries;

use std::path::Path;

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

/// Default path for the relief map database.
pub const DEFAULT_DB_PATH: &str = "data/relief_map.db";

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// JSON column serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Returns the current time as an RFC 3339 string, the timestamp format
/// used for every stored date in the system.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Opens (or creates) the relief map `SQLite` database and ensures the
/// schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the database cannot be opened or schema creation
/// fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path))
        .map_err(|e| DbError::Conversion {
            message: format!("Failed to open database: {e}"),
        })?;

    ensure_schema(db.as_ref()).await?;

    Ok(db)
}

/// Opens an in-memory database with the full schema, for tests.
///
/// # Errors
///
/// Returns [`DbError`] if the database cannot be opened or schema creation
/// fails.
pub async fn open_in_memory() -> Result<Box<dyn Database>, DbError> {
    let db = init_sqlite_rusqlite(None).map_err(|e| DbError::Conversion {
        message: format!("Failed to open in-memory database: {e}"),
    })?;

    ensure_schema(db.as_ref()).await?;

    Ok(db)
}

/// Opens the database at the path given by the `RELIEF_MAP_DB` environment
/// variable, falling back to [`DEFAULT_DB_PATH`].
///
/// # Errors
///
/// Returns [`DbError`] if the database cannot be opened or schema creation
/// fails.
pub async fn connect_from_env() -> Result<Box<dyn Database>, DbError> {
    let path = std::env::var("RELIEF_MAP_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    open_db(Path::new(&path)).await
}

/// Creates all tables and indexes if they don't already exist.
async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS incidents (
            id                 TEXT PRIMARY KEY,
            category           TEXT NOT NULL,
            kind               TEXT NOT NULL,
            description        TEXT,
            urgency            TEXT NOT NULL,
            lat                REAL NOT NULL,
            lng                REAL NOT NULL,
            status             TEXT NOT NULL,
            user_id            TEXT NOT NULL,
            media_ids          TEXT NOT NULL DEFAULT '[]',
            assigned_resources TEXT NOT NULL DEFAULT '[]',
            notes              TEXT NOT NULL DEFAULT '',
            version            INTEGER NOT NULL DEFAULT 1,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS principals (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            email         TEXT NOT NULL UNIQUE,
            phone         TEXT,
            role          TEXT NOT NULL,
            prefs         TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            salt          TEXT NOT NULL,
            created_at    TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS sessions (
            secret       TEXT PRIMARY KEY,
            principal_id TEXT NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
            created_at   TEXT NOT NULL,
            expires_at   TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS assignments (
            id            TEXT PRIMARY KEY,
            incident_id   TEXT NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
            resource_id   TEXT NOT NULL REFERENCES principals(id),
            resource_type TEXT NOT NULL,
            assigned_at   TEXT NOT NULL,
            accepted_at   TEXT,
            completed_at  TEXT,
            status        TEXT NOT NULL,
            notes         TEXT
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_incidents_status
         ON incidents (status, created_at)",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_incidents_user
         ON incidents (user_id)",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_principals_role
         ON principals (role)",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_assignments_resource
         ON assignments (resource_id, assigned_at)",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_assignments_incident
         ON assignments (incident_id)",
    )
    .await?;

    // Enable foreign key enforcement (SQLite has it off by default)
    db.exec_raw("PRAGMA foreign_keys = ON").await?;

    Ok(())
}
