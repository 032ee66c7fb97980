use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{now, StoreError};
use crate::record::file::Upload;

pub fn insert_upload(
    conn: &Connection,
    transfer_id: &str,
    temp_path: &Path,
    upload_length: u64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO upload (transfer_id, temp_path, upload_length, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![transfer_id, temp_path.to_string_lossy(), upload_length as i64, now()],
    )?;
    Ok(())
}

pub fn load_upload(conn: &Connection, transfer_id: &str) -> Result<Option<Upload>, StoreError> {
    let upload = conn
        .query_row(
            "SELECT transfer_id, temp_path, upload_length, created_at FROM upload WHERE transfer_id = ?1",
            [transfer_id],
            |row| {
                let temp_path: String = row.get(1)?;
                let upload_length: i64 = row.get(2)?;
                Ok(Upload {
                    transfer_id: row.get(0)?,
                    temp_path: PathBuf::from(temp_path),
                    upload_length: upload_length as u64,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(upload)
}

pub fn delete_upload(conn: &Connection, transfer_id: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM upload WHERE transfer_id = ?1", [transfer_id])?;
    Ok(())
}
