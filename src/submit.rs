//! Turn a project and its files into one pipeline run on the job worker
//!
//! A run claims the project (compare-and-swap on its status), waits for its read files to stop
//! changing, pairs them, sends the request and records the returned task id as the project's
//! active job handle. Any failure after the claim marks the project failed with the reason.

use std::path::PathBuf;

use thiserror::Error;

use crate::db::StoreError;
use crate::pairing::PairingError;
use crate::record::project::ProjectStatus;
use crate::worker::WorkerError;

/// Wait for uploads to settle before submitting
pub mod wait;
/// Claim, pair, submit and record
pub mod orchestrator;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("project {0} not found")]
    NotFound(i64),

    #[error("project {id} is {status}, a run cannot start now")]
    Conflict { id: i64, status: ProjectStatus },

    #[error("{0} is still being uploaded")]
    UploadIncomplete(String),

    #[error("{} is missing from storage", .0.display())]
    MissingFile(PathBuf),

    #[error("project {0} has no job")]
    NoJob(i64),

    #[error("{0}")]
    Aborted(String),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
