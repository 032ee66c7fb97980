//! All durable state is stored in a SQLite database
//!
//! The store only does CRUD. Each operation takes the connection lock for the length of one
//! statement or transaction, so long waits (upload stability, worker calls) never hold it.

use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Connect to a SQLite database and apply the schema
pub mod open;
/// File artifacts, including the erase-on-delete hook
pub mod file;
/// Chunked upload bookkeeping
pub mod upload;
/// Projects and their status compare-and-swap
pub mod project;
/// Job handles returned by the worker
pub mod job;
/// Audit trail
pub mod action;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared handle to the record store
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Store { conn: Mutex::new(conn) }
    }

    /// Run `f` with exclusive access to the connection
    pub fn with<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }
}

/// Timestamp format used in every `*_at` column
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
