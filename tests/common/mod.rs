//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use seqdock::config::WorkingDirectory;
use seqdock::db::open::open_in_memory;
use seqdock::db::project::insert_project;
use seqdock::db::Store;
use seqdock::record::file::{FileRecord, SampleRole};
use seqdock::record::project::{Algorithms, NewProject, Project};
use seqdock::submit::orchestrator::Orchestrator;
use seqdock::submit::wait::StabilityPolicy;
use seqdock::upload::chunk::{append_chunk, begin_upload, BeginUpload};
use seqdock::upload::finalize::finalize;
use seqdock::worker::request::SubmissionRequest;
use seqdock::worker::{JobWorker, TaskState, TaskStatus, WorkerError};
use tempfile::TempDir;

/// In-process job worker that records what it was sent
#[derive(Default)]
pub struct MockWorker {
    pub submitted: Mutex<Vec<SubmissionRequest>>,
    pub state: Mutex<Option<TaskState>>,
    pub error: Mutex<Option<String>>,
    counter: AtomicUsize,
}

impl MockWorker {
    pub fn finish_with(&self, state: TaskState, error: Option<&str>) {
        *self.state.lock().unwrap() = Some(state);
        *self.error.lock().unwrap() = error.map(str::to_string);
    }

    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobWorker for MockWorker {
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, WorkerError> {
        self.submitted.lock().unwrap().push(request.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{n}"))
    }

    async fn status(&self, task_id: &str) -> Result<TaskStatus, WorkerError> {
        let state = *self.state.lock().unwrap();
        Ok(TaskStatus {
            task_id: task_id.to_string(),
            state: state.unwrap_or(TaskState::Started),
            result: None,
            error: self.error.lock().unwrap().clone(),
        })
    }
}

pub struct Fixture {
    _dir: TempDir,
    pub wd: WorkingDirectory,
    pub tmp: PathBuf,
    pub store: Arc<Store>,
    pub worker: Arc<MockWorker>,
    pub orchestrator: Arc<Orchestrator>,
}

fn fastq(name: &str) -> String {
    format!("@{name}\nACGT\n+\nIIII\n")
}

/// Uploads count as settled straight away
pub fn instant_policy() -> StabilityPolicy {
    StabilityPolicy {
        quiet: Duration::ZERO,
        poll: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

impl Fixture {
    pub fn new() -> Fixture {
        Fixture::with_policy(instant_policy())
    }

    pub fn with_policy(policy: StabilityPolicy) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let wd = WorkingDirectory::new(dir.path().join("data"));
        let tmp = dir.path().join("upload_tmp");
        let store = Arc::new(open_in_memory().unwrap());
        let worker = Arc::new(MockWorker::default());
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), worker.clone(), wd.clone(), policy));
        Fixture { _dir: dir, wd, tmp, store, worker, orchestrator }
    }

    /// Upload `name` in one chunk and finalize it
    pub fn upload(&self, user_id: i64, role: SampleRole, name: &str) -> FileRecord {
        let pending = self.begin_named(user_id, role, name);
        self.finish(&pending, name)
    }

    /// Open a transfer sized for `name` and send nothing yet
    pub fn begin_named(&self, user_id: i64, role: SampleRole, name: &str) -> FileRecord {
        self.begin(user_id, role, fastq(name).len() as u64)
    }

    /// Send the whole body of a transfer opened with `begin_named` and finalize it
    pub fn finish(&self, pending: &FileRecord, name: &str) -> FileRecord {
        let transfer = pending.transfer_id.clone().unwrap();
        append_chunk(&self.store, &transfer, 0, fastq(name).as_bytes()).unwrap();
        finalize(&self.store, &self.wd, &transfer, name).unwrap()
    }

    /// Open a transfer and leave it unfinished
    pub fn begin(&self, user_id: i64, role: SampleRole, upload_length: u64) -> FileRecord {
        let request = BeginUpload { user_id, upload_length, sample_role: role, demo: false };
        begin_upload(&self.store, &self.tmp, &request).unwrap()
    }

    pub fn project(&self, user_id: i64, project_type: &str, files: &[&FileRecord]) -> Project {
        let request = NewProject {
            user_id,
            name: "liver".to_string(),
            project_type: project_type.to_string(),
            algorithms: Algorithms {
                aligner: "bwa".to_string(),
                variant_caller: "mutect".to_string(),
                annotator: "vep".to_string(),
            },
            file_ids: files.iter().map(|file| file.id).collect(),
        };
        self.store.with(|conn| insert_project(conn, &request)).unwrap()
    }
}
