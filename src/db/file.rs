use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::upload::{delete_upload, load_upload};
use crate::db::{now, StoreError};
use crate::record::file::{FileRecord, FileState, NewFile, SampleRole};
use crate::record::file_type::FileType;

const COLUMNS: &str =
    "id, user_id, project_id, name, file_type, sample_role, path, transfer_id, state, demo, uploaded_at";

fn from_row(row: &Row) -> rusqlite::Result<FileRecord> {
    let file_type: String = row.get(4)?;
    let state: String = row.get(8)?;
    let sample_role: Option<String> = row.get(5)?;
    let path: Option<String> = row.get(6)?;
    Ok(FileRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        name: row.get(3)?,
        file_type: file_type
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?,
        sample_role: SampleRole::from_code(sample_role.as_deref()),
        path: path.map(PathBuf::from),
        transfer_id: row.get(7)?,
        state: state
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, e.into()))?,
        demo: row.get(9)?,
        uploaded_at: row.get(10)?,
    })
}

/// Create the pending artifact for a transfer that just started
pub fn insert_pending(conn: &Connection, file: &NewFile) -> Result<FileRecord, StoreError> {
    conn.execute(
        "INSERT INTO file (user_id, sample_role, transfer_id, state, demo, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            file.user_id,
            file.sample_role.code(),
            file.transfer_id,
            FileState::Pending.as_str(),
            file.demo,
            now()
        ],
    )?;
    let id = conn.last_insert_rowid();
    load_file(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("file {id}")))
}

pub fn load_file(conn: &Connection, id: i64) -> Result<Option<FileRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM file WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], from_row).optional()?)
}

pub fn load_by_transfer(conn: &Connection, transfer_id: &str) -> Result<Option<FileRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM file WHERE transfer_id = ?1");
    Ok(conn.query_row(&sql, [transfer_id], from_row).optional()?)
}

/// Files attached to a project, oldest first
pub fn project_files(conn: &Connection, project_id: i64) -> Result<Vec<FileRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM file WHERE project_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([project_id], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<FileRecord>>>()?)
}

/// Attach a file to a project
///
/// The file must belong to `user_id` and not already be attached to another project.
pub fn attach_to_project(conn: &Connection, file_id: i64, project_id: i64, user_id: i64) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE file SET project_id = ?1 WHERE id = ?2 AND user_id = ?3 AND project_id IS NULL",
        params![project_id, file_id, user_id],
    )?;
    match changed {
        0 => Err(StoreError::Invalid(format!(
            "file {file_id} is not an unattached file of user {user_id}"
        ))),
        _ => Ok(()),
    }
}

/// Record the permanent location of a pending artifact
///
/// Only a pending row is touched; returns false when the artifact was already finalized.
pub fn mark_finalized(conn: &Connection, id: i64, name: &str, path: &Path) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE file SET name = ?1, file_type = ?2, path = ?3, state = ?4, transfer_id = NULL WHERE id = ?5 AND state = ?6",
        params![
            name,
            FileType::infer(name).as_str(),
            path.to_string_lossy(),
            FileState::Finalized.as_str(),
            id,
            FileState::Pending.as_str()
        ],
    )?;
    Ok(changed == 1)
}

/// Delete a file record and erase its bytes
///
/// Runs in one transaction: the row goes first, then the blob (and, for a pending artifact, its
/// temporary blob and upload record). If the blob cannot be removed the transaction rolls back, so
/// neither a dangling record nor an orphaned file is left behind.
pub fn delete_file(conn: &mut Connection, id: i64) -> Result<Option<FileRecord>, StoreError> {
    let tx = conn.transaction()?;
    let record = match load_file(&tx, id)? {
        Some(record) => record,
        None => return Ok(None),
    };
    remove_record(&tx, &record)?;
    tx.commit()?;
    info!("Deleted file {} ({})", record.id, record.name);
    Ok(Some(record))
}

/// Row + bytes removal shared by file and project deletion; caller owns the transaction
pub(crate) fn remove_record(conn: &Connection, record: &FileRecord) -> Result<(), StoreError> {
    conn.execute("DELETE FROM file WHERE id = ?1", [record.id])?;

    if let Some(path) = &record.path {
        erase(path)?;
    }
    if let Some(transfer_id) = &record.transfer_id {
        if let Some(upload) = load_upload(conn, transfer_id)? {
            erase(&upload.temp_path)?;
            delete_upload(conn, transfer_id)?;
        }
    }
    Ok(())
}

fn erase(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Erased {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!("{} was already gone", path.display());
            Ok(())
        }
        Err(err) => Err(StoreError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open::open_in_memory;
    use crate::db::upload::insert_upload;

    fn new_file(transfer_id: &str) -> NewFile {
        NewFile {
            user_id: 1,
            transfer_id: transfer_id.to_string(),
            sample_role: SampleRole::Tumor,
            demo: false,
        }
    }

    #[test]
    fn pending_then_finalized() {
        let store = open_in_memory().unwrap();
        store
            .with(|conn| {
                let pending = insert_pending(conn, &new_file("t-1"))?;
                assert_eq!(pending.state, FileState::Pending);
                assert_eq!(pending.sample_role, SampleRole::Tumor);
                assert_eq!(load_by_transfer(conn, "t-1")?.map(|f| f.id), Some(pending.id));

                assert!(mark_finalized(conn, pending.id, "S1_R1_001.fastq.gz", Path::new("/x/1_S1")).unwrap());
                // second finalize is refused
                assert!(!mark_finalized(conn, pending.id, "other.bam", Path::new("/x/1_o")).unwrap());

                let done = load_file(conn, pending.id)?.unwrap();
                assert_eq!(done.file_type, FileType::Fq);
                assert_eq!(done.transfer_id, None);
                assert_eq!(done.path, Some(PathBuf::from("/x/1_S1")));
                assert!(done.is_finalized());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn delete_erases_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let blob = dir.path().join("1_reads.bam");
        std::fs::write(&blob, b"BAM").unwrap();

        let store = open_in_memory().unwrap();
        store
            .with(|conn| {
                let file = insert_pending(conn, &new_file("t-2"))?;
                mark_finalized(conn, file.id, "reads.bam", &blob)?;
                let deleted = delete_file(conn, file.id)?;
                assert!(deleted.is_some());
                assert!(load_file(conn, file.id)?.is_none());
                assert!(delete_file(conn, file.id)?.is_none());
                Ok(())
            })
            .unwrap();
        assert!(!blob.exists());
    }

    #[test]
    fn delete_pending_drops_temp_blob() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("t-3");
        std::fs::write(&temp, b"partial").unwrap();

        let store = open_in_memory().unwrap();
        store
            .with(|conn| {
                let file = insert_pending(conn, &new_file("t-3"))?;
                insert_upload(conn, "t-3", &temp, 100)?;
                delete_file(conn, file.id)?;
                assert!(load_upload(conn, "t-3")?.is_none());
                Ok(())
            })
            .unwrap();
        assert!(!temp.exists());
    }

    #[test]
    fn failed_erase_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory cannot be removed with remove_file
        let blob = dir.path().join("dir.bam");
        std::fs::create_dir(&blob).unwrap();
        std::fs::write(blob.join("inner"), b"x").unwrap();

        let store = open_in_memory().unwrap();
        let id = store
            .with(|conn| {
                let file = insert_pending(conn, &new_file("t-4"))?;
                mark_finalized(conn, file.id, "dir.bam", &blob)?;
                Ok(file.id)
            })
            .unwrap();

        let result = store.with(|conn| delete_file(conn, id));
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.with(|conn| load_file(conn, id)).unwrap().is_some());
    }
}
