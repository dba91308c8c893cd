//! Advisory lock that serializes root daemon launches between CLI processes.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::wait::POLL_INTERVAL;
use crate::error::{Error, Result};

/// An exclusive lock on a file, released on drop.
#[derive(Debug)]
pub struct LaunchLock {
    file: File,
    path: PathBuf,
}

impl LaunchLock {
    /// Takes the lock, waiting at most `limit` for another holder to let go.
    pub async fn acquire(path: &Path, limit: Duration, cancel: &CancellationToken) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let deadline = Instant::now() + limit;
        let mut logged = false;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "launch lock acquired");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if !logged {
                        debug!(path = %path.display(), "waiting for launch lock");
                        logged = true;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Err(Error::Timeout {
                    what: "launch lock".to_string(),
                    condition: "be released",
                    path: path.to_path_buf(),
                    timeout: limit,
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled("launch lock".to_string()));
                }
                _ = sleep(POLL_INTERVAL) => {}
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LaunchLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), "failed to release launch lock: {}", e);
        }
    }
}
