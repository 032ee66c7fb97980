use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::file::insert_pending;
use crate::db::upload::{insert_upload, load_upload};
use crate::db::Store;
use crate::record::file::{FileRecord, NewFile, SampleRole};
use crate::upload::StorageError;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginUpload {
    pub user_id: i64,
    pub upload_length: u64,
    #[serde(default)]
    pub sample_role: SampleRole,
    #[serde(default)]
    pub demo: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkProgress {
    /// bytes received so far, the offset the next chunk must start at
    pub offset: u64,
    pub complete: bool,
}

/// Open a new transfer, returning the pending artifact that tracks it
pub fn begin_upload(store: &Store, tmp_dir: &Path, request: &BeginUpload) -> Result<FileRecord, StorageError> {
    let transfer_id = Uuid::new_v4().simple().to_string();
    fs::create_dir_all(tmp_dir)?;
    let temp_path = tmp_dir.join(&transfer_id);
    fs::File::create(&temp_path)?;

    let file = NewFile {
        user_id: request.user_id,
        transfer_id: transfer_id.clone(),
        sample_role: request.sample_role,
        demo: request.demo,
    };
    let created = store.with(|conn| {
        let tx = conn.transaction()?;
        insert_upload(&tx, &transfer_id, &temp_path, request.upload_length)?;
        let pending = insert_pending(&tx, &file)?;
        tx.commit()?;
        Ok(pending)
    });

    match created {
        Ok(pending) => {
            info!("Began transfer {} of {} bytes for user {}", transfer_id, request.upload_length, request.user_id);
            Ok(pending)
        }
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!("Can't remove {}: {}", temp_path.display(), cleanup);
            }
            Err(err.into())
        }
    }
}

/// Append `bytes` to a transfer, which must currently hold exactly `offset` bytes
pub fn append_chunk(store: &Store, transfer_id: &str, offset: u64, bytes: &[u8]) -> Result<ChunkProgress, StorageError> {
    let upload = store
        .with(|conn| load_upload(conn, transfer_id))?
        .ok_or_else(|| StorageError::NotFound(format!("transfer {transfer_id}")))?;

    let mut blob = OpenOptions::new().append(true).open(&upload.temp_path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotFound(upload.temp_path.display().to_string()),
        _ => StorageError::Io(err),
    })?;
    let received = blob.metadata()?.len();
    if received != offset {
        return Err(StorageError::OffsetMismatch { offset, received });
    }
    let end = offset + bytes.len() as u64;
    if end > upload.upload_length {
        return Err(StorageError::TooLong { declared: upload.upload_length });
    }

    blob.write_all(bytes)?;
    blob.flush()?;

    Ok(ChunkProgress {
        offset: end,
        complete: end == upload.upload_length,
    })
}
