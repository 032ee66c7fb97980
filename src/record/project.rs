use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a project is in its life
///
/// The progression is linear: pending -> in_progress -> completed. Cancelled and failed are
/// terminal until a rerun claims the project again. Failure is reachable from pending and
/// in_progress.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl ProjectStatus {
    /// db column value
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
            ProjectStatus::Failed => "failed",
        }
    }

    /// States a rerun may start from
    pub const RERUNNABLE: [ProjectStatus; 3] = [
        ProjectStatus::Completed,
        ProjectStatus::Failed,
        ProjectStatus::Cancelled,
    ];
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProjectStatus::Pending),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            "failed" => Ok(ProjectStatus::Failed),
            other => Err(format!("unknown project status {other}")),
        }
    }
}

/// Pipeline tools chosen by the user, passed through to the worker untouched
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Algorithms {
    pub aligner: String,
    pub variant_caller: String,
    #[serde(alias = "variantAnnotator")]
    pub annotator: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// "SM" for somatic, anything else is germline
    pub project_type: String,
    pub status: ProjectStatus,
    pub algorithms: Algorithms,
    /// last failure message, cleared when the project is claimed again
    pub error: Option<String>,
    pub created_at: String,
}

impl Project {
    pub fn is_somatic(&self) -> bool {
        self.project_type == "SM"
    }
}

/// A project name becomes one directory under the user's project root, so it must be a single
/// plain path component
pub fn is_valid_project_name(name: &str) -> bool {
    if name.trim().is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub user_id: i64,
    pub name: String,
    pub project_type: String,
    pub algorithms: Algorithms,
    #[serde(default)]
    pub file_ids: Vec<i64>,
}

/// A worker-assigned task for a project
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub id: i64,
    pub project_id: i64,
    pub task_id: String,
    /// set once a rerun replaced this handle
    pub superseded: bool,
    pub created_at: String,
}
