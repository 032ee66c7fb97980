//! The external job worker that runs the genomics pipeline
//!
//! Submission is fire-and-forget: the worker answers with a task id straight away and reports
//! progress and results when asked about that id later.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The pipeline submission message
pub mod request;
/// Worker reached over its HTTP/JSON API
pub mod http;

use crate::worker::request::SubmissionRequest;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid worker url: {0}")]
    Url(#[from] url::ParseError),

    #[error("worker returned an empty task id")]
    EmptyTaskId,

    #[error("worker rejected the request: {0}")]
    Rejected(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
}

/// Parsed pipeline output, as reported by the worker
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectResults {
    pub coverage_stats: serde_json::Map<String, serde_json::Value>,
    pub mapped_reads_percentage: Option<f64>,
    pub variants: Vec<serde_json::Value>,
    pub variant_counts: std::collections::BTreeMap<String, u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    #[serde(default)]
    pub result: Option<ProjectResults>,
    /// failure message when `state` is `failure`
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait JobWorker: Send + Sync {
    /// Hand the pipeline request to the worker, returning the task id it assigned
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, WorkerError>;

    /// Current state of a previously submitted task
    async fn status(&self, task_id: &str) -> Result<TaskStatus, WorkerError>;
}
