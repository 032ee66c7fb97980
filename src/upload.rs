//! Chunked uploads: temporary assembly, then a move into permanent storage
//!
//! A transfer begins with an empty temporary blob, an `upload` bookkeeping row and a pending
//! file artifact. Chunks are appended at the offset the client reports. Finalizing moves the blob
//! to `<root>/users/<user>/files/<file id>_<name>` and only then marks the artifact finalized, so a
//! failed move leaves everything pending and retryable.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::db::StoreError;

/// Start a transfer and append chunks to it
pub mod chunk;
/// Move a completed transfer into permanent storage
pub mod finalize;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("chunk starts at offset {offset} but {received} bytes were received")]
    OffsetMismatch { offset: u64, received: u64 },

    #[error("chunk would grow the upload past its declared {declared} bytes")]
    TooLong { declared: u64 },

    #[error("transfer holds {received} of its declared {declared} bytes")]
    Incomplete { received: u64, declared: u64 },

    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
