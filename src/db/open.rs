use log::info;
use rusqlite::Connection;

use crate::config::WorkingDirectory;
use crate::db::{Store, StoreError};

static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/schema.sql"));

pub fn open_db(wd: &WorkingDirectory) -> Result<Store, StoreError> {
    std::fs::create_dir_all(&wd.path)?;
    let path = wd.db_path();
    if !path.exists() { info!("Creating new database {}", path.display()) }
    let conn = Connection::open(&path)?;
    prepare(conn)
}

/// Throwaway database for tests
pub fn open_in_memory() -> Result<Store, StoreError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Store, StoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(Store::new(conn))
}
