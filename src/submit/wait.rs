use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::info;
use tokio::time::{sleep, Instant};

use crate::submit::SubmitError;

/// How long to wait for uploads to settle before a submission
#[derive(Clone, Copy, Debug)]
pub struct StabilityPolicy {
    /// no write for this long means the file is complete
    pub quiet: Duration,
    pub poll: Duration,
    pub timeout: Duration,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        StabilityPolicy {
            quiet: Duration::from_secs(1),
            poll: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll modification times until none of `paths` has been written within the quiet period
///
/// Only file metadata is read, no lock is held while sleeping.
pub async fn wait_until_stable(paths: &[PathBuf], policy: StabilityPolicy) -> Result<(), SubmitError> {
    let deadline = Instant::now() + policy.timeout;
    loop {
        let mut busy = None;
        for path in paths {
            if !settled(path, policy.quiet).await? {
                busy = Some(path);
                break;
            }
        }

        match busy {
            None => return Ok(()),
            Some(path) if Instant::now() >= deadline => {
                return Err(SubmitError::UploadIncomplete(path.display().to_string()));
            }
            Some(path) => {
                info!("{} is still being written, waiting", path.display());
                sleep(policy.poll.min(deadline.saturating_duration_since(Instant::now()))).await;
            }
        }
    }
}

async fn settled(path: &Path, quiet: Duration) -> Result<bool, SubmitError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| SubmitError::MissingFile(path.to_path_buf()))?;
    let modified = metadata
        .modified()
        .map_err(|_| SubmitError::MissingFile(path.to_path_buf()))?;
    // a modification time in the future counts as just written
    let age = SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO);
    Ok(age >= quiet)
}
