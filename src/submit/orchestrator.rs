use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use tokio::time::{sleep, Instant};

use crate::config::WorkingDirectory;
use crate::db::file::project_files;
use crate::db::job::{active_job, insert_job};
use crate::db::project::{fail_project, load_project, transition};
use crate::db::Store;
use crate::pairing::{resolve_pairs, ReadFile};
use crate::record::file::{FileRecord, SampleRole};
use crate::record::file_type::FileType;
use crate::record::project::{JobHandle, Project, ProjectStatus};
use crate::submit::wait::{wait_until_stable, StabilityPolicy};
use crate::submit::SubmitError;
use crate::worker::request::SubmissionRequest;
use crate::worker::{JobWorker, TaskState, TaskStatus, WorkerError};

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<Store>,
    worker: Arc<dyn JobWorker>,
    wd: WorkingDirectory,
    stability: StabilityPolicy,
}

/// A project's files split the way the pipeline consumes them
#[derive(Debug, Default)]
struct Partition {
    normal: Vec<ReadFile>,
    tumor: Vec<ReadFile>,
    bed: Option<PathBuf>,
}

impl Partition {
    /// Every file in `files` must be finalized; a pending one is an upload still in flight
    fn of(files: &[FileRecord]) -> Result<Partition, SubmitError> {
        let mut partition = Partition::default();
        for file in files {
            let path = match (&file.path, file.is_finalized()) {
                (Some(path), true) => path.clone(),
                _ => {
                    let transfer = file.transfer_id.as_deref().unwrap_or_default();
                    return Err(SubmitError::UploadIncomplete(format!("file {} (transfer {transfer})", file.id)));
                }
            };
            let read = ReadFile { name: file.name.clone(), path: path.clone() };
            match file.sample_role {
                SampleRole::Normal => partition.normal.push(read),
                SampleRole::Tumor => partition.tumor.push(read),
                SampleRole::None => {}
            }
            if file.file_type == FileType::Bed {
                match partition.bed {
                    None => partition.bed = Some(path),
                    Some(_) => warn!("Ignoring extra BED file {}", file.name),
                }
            }
        }
        Ok(partition)
    }

    fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .normal
            .iter()
            .chain(self.tumor.iter())
            .map(|read| read.path.clone())
            .chain(self.bed.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<Store>,
        worker: Arc<dyn JobWorker>,
        wd: WorkingDirectory,
        stability: StabilityPolicy,
    ) -> Orchestrator {
        Orchestrator { store, worker, wd, stability }
    }

    /// First run of a pending project
    ///
    /// Concurrent calls for the same project race on the pending -> in_progress swap; only one
    /// wins, the others get `SubmitError::Conflict`.
    pub async fn submit(&self, project_id: i64) -> Result<JobHandle, SubmitError> {
        self.run(project_id, &[ProjectStatus::Pending]).await
    }

    /// Another run of a finished, failed or cancelled project, superseding its current job handle
    pub async fn rerun(&self, project_id: i64) -> Result<JobHandle, SubmitError> {
        self.run(project_id, &ProjectStatus::RERUNNABLE).await
    }

    /// Ask the worker about the project's active job and settle the project status if it finished
    pub async fn refresh(&self, project_id: i64) -> Result<TaskStatus, SubmitError> {
        let job = self
            .store
            .with(|conn| active_job(conn, project_id))?
            .ok_or(SubmitError::NoJob(project_id))?;
        let status = self.worker.status(&job.task_id).await?;

        match status.state {
            TaskState::Success => {
                self.store.with(|conn| {
                    transition(conn, project_id, &[ProjectStatus::InProgress], ProjectStatus::Completed)
                })?;
            }
            TaskState::Failure => {
                let reason = status.error.as_deref().unwrap_or("pipeline failed");
                self.store.with(|conn| fail_project(conn, project_id, reason))?;
            }
            TaskState::Pending | TaskState::Started => {}
        }
        Ok(status)
    }

    async fn run(&self, project_id: i64, from: &[ProjectStatus]) -> Result<JobHandle, SubmitError> {
        let project = self
            .store
            .with(|conn| load_project(conn, project_id))?
            .ok_or(SubmitError::NotFound(project_id))?;

        let claimed = self
            .store
            .with(|conn| transition(conn, project_id, from, ProjectStatus::InProgress))?;
        if !claimed {
            let status = self
                .store
                .with(|conn| load_project(conn, project_id))?
                .map(|current| current.status)
                .unwrap_or(project.status);
            return Err(SubmitError::Conflict { id: project_id, status });
        }
        info!("Claimed project {} ({}) for a run", project.id, project.name);

        // the claimed run lives on its own task, so a caller going away does not strand it
        let orchestrator = self.clone();
        let run = tokio::spawn(async move { orchestrator.finish(&project).await });
        match run.await {
            Ok(result) => result,
            Err(err) => {
                let reason = format!("run interrupted: {err}");
                self.mark_failed(project_id, &reason);
                Err(SubmitError::Aborted(reason))
            }
        }
    }

    async fn finish(&self, project: &Project) -> Result<JobHandle, SubmitError> {
        let result = self.dispatch(project).await;
        if let Err(err) = &result {
            warn!("Run of project {} failed: {}", project.id, err);
            self.mark_failed(project.id, &err.to_string());
        }
        result
    }

    fn mark_failed(&self, project_id: i64, reason: &str) {
        if let Err(err) = self.store.with(|conn| fail_project(conn, project_id, reason)) {
            warn!("Can't mark project {} failed: {}", project_id, err);
        }
    }

    /// Wait until every file of the project is finalized and has stopped changing
    ///
    /// Uploads still in flight are polled for until the stability timeout; the same deadline
    /// covers the quiet-period wait that follows.
    async fn settled_partition(&self, project_id: i64) -> Result<Partition, SubmitError> {
        let deadline = Instant::now() + self.stability.timeout;
        let partition = loop {
            let files = self.store.with(|conn| project_files(conn, project_id))?;
            match Partition::of(&files) {
                Ok(partition) => break partition,
                Err(SubmitError::UploadIncomplete(what)) if Instant::now() < deadline => {
                    info!("Project {} waits for {}", project_id, what);
                    sleep(self.stability.poll.min(deadline.saturating_duration_since(Instant::now()))).await;
                }
                Err(err) => return Err(err),
            }
        };

        let remaining = StabilityPolicy {
            timeout: deadline.saturating_duration_since(Instant::now()),
            ..self.stability
        };
        wait_until_stable(&partition.paths(), remaining).await?;
        Ok(partition)
    }

    async fn dispatch(&self, project: &Project) -> Result<JobHandle, SubmitError> {
        let partition = self.settled_partition(project.id).await?;

        let mut normal_pairs = resolve_pairs(&partition.normal)?.into_iter();
        let tumor_pairs = resolve_pairs(&partition.tumor)?;
        let normal_sample = normal_pairs.next();
        if normal_pairs.len() > 0 {
            warn!("Project {} has {} extra normal pairs, using the first", project.id, normal_pairs.len());
        }

        let workdir = self.wd.project_dir(project.user_id, project.id, &project.name);
        tokio::fs::create_dir_all(&workdir).await?;

        let request = SubmissionRequest::new(project, workdir, normal_sample, tumor_pairs, partition.bed);
        let task_id = self.worker.submit(&request).await?;
        if task_id.trim().is_empty() {
            return Err(WorkerError::EmptyTaskId.into());
        }

        let handle = self.store.with(|conn| insert_job(conn, project.id, &task_id))?;
        info!("Project {} submitted as task {}", project.id, handle.task_id);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str, role: SampleRole, finalized: bool) -> FileRecord {
        FileRecord {
            id,
            user_id: 1,
            project_id: Some(1),
            name: name.to_string(),
            file_type: FileType::infer(name),
            sample_role: role,
            path: finalized.then(|| PathBuf::from(format!("/f/{id}_{name}"))),
            transfer_id: (!finalized).then(|| format!("t{id}")),
            state: match finalized {
                true => crate::record::file::FileState::Finalized,
                false => crate::record::file::FileState::Pending,
            },
            demo: false,
            uploaded_at: String::new(),
        }
    }

    #[test]
    fn partition_by_role_and_bed() {
        let files = vec![
            record(1, "N_R1_001.fq", SampleRole::Normal, true),
            record(2, "T_R1_001.fq", SampleRole::Tumor, true),
            record(3, "targets.bed", SampleRole::None, true),
            record(4, "more.bed", SampleRole::None, true),
            record(5, "notes.txt", SampleRole::None, true),
        ];

        let partition = Partition::of(&files).unwrap();
        assert_eq!(partition.normal.len(), 1);
        assert_eq!(partition.tumor.len(), 1);
        assert_eq!(partition.bed, Some(PathBuf::from("/f/3_targets.bed")));
        assert_eq!(partition.paths().len(), 3);
    }

    #[test]
    fn pending_files_are_not_partitioned() {
        let files = vec![
            record(1, "N_R1_001.fq", SampleRole::Normal, true),
            record(2, "", SampleRole::Normal, false),
        ];
        assert!(matches!(Partition::of(&files), Err(SubmitError::UploadIncomplete(_))));
    }
}
