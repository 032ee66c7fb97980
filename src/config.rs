//! Command line and environment configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

/// The storage root: the database, user files and project working directories live under it
#[derive(Clone, Debug)]
pub struct WorkingDirectory {
    pub path: PathBuf,
}

impl WorkingDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WorkingDirectory { path: path.into() }
    }

    pub fn db_path(&self) -> PathBuf {
        self.path.join("seqdock.db")
    }

    pub fn user_dir(&self, user_id: i64) -> PathBuf {
        self.path.join("users").join(user_id.to_string())
    }

    /// Permanent home of finalized uploads
    pub fn user_files_dir(&self, user_id: i64) -> PathBuf {
        self.user_dir(user_id).join("files")
    }

    /// Pipeline working directory, `<id>_<name>` so renamed projects never collide
    pub fn project_dir(&self, user_id: i64, project_id: i64, project_name: &str) -> PathBuf {
        self.user_dir(user_id)
            .join("projects")
            .join(format!("{project_id}_{project_name}"))
    }

    /// Resolve a client supplied relative path, refusing anything that is not a plain component
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let plain = relative
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
        match plain && relative.components().next().is_some() {
            true => Some(self.path.join(relative)),
            false => None,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "seqdock", about = "Read upload, pairing and pipeline submission service")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service
    Serve,
    /// Print the directory tree of a folder as JSON
    Tree {
        dir: PathBuf,
        /// display name of the root node (defaults to the folder name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Submit a pending project to the job worker
    Submit { project: i64 },
    /// Submit a finished or failed project again
    Rerun { project: i64 },
    /// Ask the job worker how a project's active job is doing
    Status { project: i64 },
}

#[derive(Clone, Debug, Args)]
pub struct Settings {
    /// Storage root for the database, user files and project results
    #[arg(long, env = "SEQDOCK_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Where partially uploaded chunks are assembled
    #[arg(long, env = "SEQDOCK_UPLOAD_TMP", default_value = "upload_tmp")]
    pub upload_tmp: PathBuf,

    /// Base URL of the job worker's HTTP API
    #[arg(long, env = "SEQDOCK_WORKER_URL", default_value = "http://localhost:5555/")]
    pub worker_url: Url,

    #[arg(long, env = "SEQDOCK_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// A file counts as fully written once it has not been modified for this long
    #[arg(long, env = "SEQDOCK_QUIET_SECS", default_value_t = 1)]
    pub quiet_secs: u64,

    #[arg(long, env = "SEQDOCK_POLL_MS", default_value_t = 1000)]
    pub poll_ms: u64,

    /// Give up waiting for uploads to settle after this long
    #[arg(long, env = "SEQDOCK_STABLE_TIMEOUT_SECS", default_value_t = 600)]
    pub stable_timeout_secs: u64,

    #[arg(long, env = "SEQDOCK_TREE_MAX_DEPTH", default_value_t = 32)]
    pub tree_max_depth: usize,

    #[arg(long, env = "SEQDOCK_TREE_MAX_NODES", default_value_t = 100_000)]
    pub tree_max_nodes: usize,
}

impl Settings {
    pub fn working_directory(&self) -> WorkingDirectory {
        WorkingDirectory::new(&self.data_dir)
    }

    pub fn stability(&self) -> crate::submit::wait::StabilityPolicy {
        crate::submit::wait::StabilityPolicy {
            quiet: Duration::from_secs(self.quiet_secs),
            poll: Duration::from_millis(self.poll_ms),
            timeout: Duration::from_secs(self.stable_timeout_secs),
        }
    }

    pub fn tree_limits(&self) -> crate::tree::TreeLimits {
        crate::tree::TreeLimits {
            max_depth: self.tree_max_depth,
            max_nodes: self.tree_max_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_dir_is_namespaced_by_id() {
        let wd = WorkingDirectory::new("/srv/data");
        assert_eq!(
            wd.project_dir(3, 12, "liver"),
            PathBuf::from("/srv/data/users/3/projects/12_liver")
        );
        assert_eq!(wd.user_files_dir(3), PathBuf::from("/srv/data/users/3/files"));
    }

    #[test]
    fn resolve_rejects_escapes() {
        let wd = WorkingDirectory::new("/srv/data");
        assert_eq!(
            wd.resolve("users/3/a.bam"),
            Some(PathBuf::from("/srv/data/users/3/a.bam"))
        );
        assert_eq!(wd.resolve("../etc/passwd"), None);
        assert_eq!(wd.resolve("/etc/passwd"), None);
        assert_eq!(wd.resolve(""), None);
    }

    #[test]
    fn defaults_parse() {
        let cli = Cli::parse_from(["seqdock", "serve"]);
        assert_eq!(cli.settings.stable_timeout_secs, 600);
        assert_eq!(cli.settings.stability().quiet, Duration::from_secs(1));
        assert!(matches!(cli.command, Command::Serve));
    }
}
