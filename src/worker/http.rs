use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::worker::request::SubmissionRequest;
use crate::worker::{JobWorker, TaskStatus, WorkerError};

/// Name the worker registers the DNA pipeline under
static PIPELINE_TASK: &str = "pipeline";

/// Talks to the worker's task API: `POST tasks` to submit, `GET tasks/<id>` to poll
pub struct HttpWorker {
    client: Client,
    base: Url,
}

#[derive(Serialize)]
struct TaskEnvelope<'a> {
    task: &'static str,
    kwargs: &'a SubmissionRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Submitted {
    task_id: String,
}

impl HttpWorker {
    pub fn new(base: Url) -> HttpWorker {
        // join() replaces the last segment unless the base ends in a slash
        let base = match base.path().ends_with('/') {
            true => base,
            false => {
                let mut base = base;
                let path = format!("{}/", base.path());
                base.set_path(&path);
                base
            }
        };
        HttpWorker { client: Client::new(), base }
    }

    async fn rejected(response: reqwest::Response) -> WorkerError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        WorkerError::Rejected(format!("{status}: {body}"))
    }
}

#[async_trait]
impl JobWorker for HttpWorker {
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, WorkerError> {
        let url = self.base.join("tasks")?;
        info!("Submitting {} pipeline for {} to {}", PIPELINE_TASK, request.workdir.display(), url);
        let response = self
            .client
            .post(url)
            .json(&TaskEnvelope { task: PIPELINE_TASK, kwargs: request })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let submitted: Submitted = response.json().await?;
        match submitted.task_id.trim() {
            "" => Err(WorkerError::EmptyTaskId),
            id => Ok(id.to_string()),
        }
    }

    async fn status(&self, task_id: &str) -> Result<TaskStatus, WorkerError> {
        let url = self.base.join(&format!("tasks/{task_id}"))?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        Ok(response.json().await?)
    }
}
