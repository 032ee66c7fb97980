use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::WorkingDirectory;
use crate::db::action::record_action;
use crate::db::file::{load_by_transfer, load_file, mark_finalized};
use crate::db::upload::{delete_upload, load_upload};
use crate::db::{Store, StoreError};
use crate::record::action::RecordKind;
use crate::record::file::FileRecord;
use crate::upload::StorageError;

/// Turn a completed transfer into a permanent, named file artifact
///
/// The blob is moved first and the record updated second. A failed move leaves the artifact
/// pending; a failed record update moves the blob back, so the artifact is never finalized with
/// a path that does not exist.
pub fn finalize(
    store: &Store,
    wd: &WorkingDirectory,
    transfer_id: &str,
    client_name: &str,
) -> Result<FileRecord, StorageError> {
    let name = clean_name(client_name)?;
    let (file, upload) = store.with(|conn| {
        Ok((load_by_transfer(conn, transfer_id)?, load_upload(conn, transfer_id)?))
    })?;
    let not_found = || StorageError::NotFound(format!("transfer {transfer_id}"));
    let file = file.ok_or_else(not_found)?;
    let upload = upload.ok_or_else(not_found)?;

    let received = match fs::metadata(&upload.temp_path) {
        Ok(metadata) => metadata.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(upload.temp_path.display().to_string()));
        }
        Err(err) => return Err(StorageError::Io(err)),
    };
    if received != upload.upload_length {
        return Err(StorageError::Incomplete { received, declared: upload.upload_length });
    }

    let destination = wd
        .user_files_dir(file.user_id)
        .join(format!("{}_{}", file.id, name));
    info!("Finalizing transfer {} as {}", transfer_id, destination.display());
    move_blob(&upload.temp_path, &destination)?;

    let updated = store.with(|conn| {
        let tx = conn.transaction()?;
        if !mark_finalized(&tx, file.id, &name, &destination)? {
            return Err(StoreError::NotFound(format!("pending file {}", file.id)));
        }
        delete_upload(&tx, transfer_id)?;
        record_action(&tx, file.user_id, RecordKind::File, &name)?;
        let record = load_file(&tx, file.id)?
            .ok_or_else(|| StoreError::NotFound(format!("file {}", file.id)))?;
        tx.commit()?;
        Ok(record)
    });

    match updated {
        Ok(record) => Ok(record),
        Err(err) => {
            warn!("Record update for transfer {transfer_id} failed, moving blob back");
            if let Err(undo) = move_blob(&destination, &upload.temp_path) {
                warn!("Can't move {} back: {}", destination.display(), undo);
            }
            Err(err.into())
        }
    }
}

/// Keep only the final path component of a client supplied name
fn clean_name(client_name: &str) -> Result<String, StorageError> {
    let name = client_name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    match name {
        "" | "." | ".." => Err(StorageError::InvalidName(client_name.to_string())),
        _ => Ok(name.to_string()),
    }
}

/// All-or-nothing move: rename, or copy to a hidden sibling and rename when crossing devices
fn move_blob(from: &Path, to: &Path) -> Result<(), StorageError> {
    if !from.is_file() {
        return Err(StorageError::NotFound(from.display().to_string()));
    }
    let failed = |source: io::Error| StorageError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(failed)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) => {
            info!("rename failed ({err}), copying {} instead", from.display());
            copy_then_rename(from, to).map_err(failed)
        }
    }
}

fn copy_then_rename(from: &Path, to: &Path) -> io::Result<()> {
    let partial = partial_path(to);
    let copied = fs::copy(from, &partial).and_then(|_| fs::rename(&partial, to));
    if let Err(err) = copied {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }
    if let Err(err) = fs::remove_file(from) {
        // keep exactly one copy: the temporary one, so the transfer can be retried
        let _ = fs::remove_file(to);
        return Err(err);
    }
    Ok(())
}

fn partial_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    to.with_file_name(format!(".{name}.partial"))
}
