use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::file_type::FileType;

/// Which physical sample a read file belongs to
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SampleRole {
    Tumor,
    Normal,
    #[default]
    None,
}

impl SampleRole {
    /// Column value, `None` is stored as NULL
    pub fn code(&self) -> Option<&'static str> {
        match self {
            SampleRole::Tumor => Some("TUMOR"),
            SampleRole::Normal => Some("NORMAL"),
            SampleRole::None => None,
        }
    }

    pub fn from_code(code: Option<&str>) -> SampleRole {
        match code {
            Some("TUMOR") => SampleRole::Tumor,
            Some("NORMAL") => SampleRole::Normal,
            _ => SampleRole::None,
        }
    }
}

/// Upload lifecycle of a file artifact
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// chunks are still arriving in temporary storage
    Pending,
    /// moved to its permanent path
    Finalized,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Pending => "pending",
            FileState::Finalized => "finalized",
        }
    }
}

impl FromStr for FileState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FileState::Pending),
            "finalized" => Ok(FileState::Finalized),
            other => Err(format!("unknown file state {other}")),
        }
    }
}

/// A file artifact owned by a user, optionally attached to a project
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub user_id: i64,
    pub project_id: Option<i64>,
    pub name: String,
    pub file_type: FileType,
    pub sample_role: SampleRole,
    /// permanent storage path, only set once finalized
    pub path: Option<PathBuf>,
    /// chunked upload transfer id, cleared once finalized
    pub transfer_id: Option<String>,
    pub state: FileState,
    pub demo: bool,
    pub uploaded_at: String,
}

impl FileRecord {
    pub fn is_finalized(&self) -> bool {
        self.state == FileState::Finalized
    }
}

/// Fields needed to start tracking a new upload
#[derive(Clone, Debug)]
pub struct NewFile {
    pub user_id: i64,
    pub transfer_id: String,
    pub sample_role: SampleRole,
    pub demo: bool,
}

/// Bookkeeping for a chunked upload that has not been finalized yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub transfer_id: String,
    pub temp_path: PathBuf,
    /// total size the client declared when the transfer began
    pub upload_length: u64,
    pub created_at: String,
}
