//! Per-user directories for logs, cache and configuration.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const APP_NAME: &str = "telepath";

/// Name of the root daemon log file inside the log directory.
pub const DAEMON_LOG: &str = "daemon.log";

/// The directories the client writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    pub log_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl AppDirs {
    /// Platform directories of the current user.
    pub fn new() -> Result<Self> {
        let cache = dirs::cache_dir()
            .ok_or_else(|| Error::Config("Could not determine cache directory".to_string()))?
            .join(APP_NAME);
        let config = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
            .join(APP_NAME);
        let log_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .map(|h| h.join("Library").join("Logs").join(APP_NAME))
                .unwrap_or_else(|| cache.join("logs"))
        } else {
            cache.join("logs")
        };
        Ok(Self {
            log_dir,
            cache_dir: cache,
            config_dir: config,
        })
    }

    /// All directories below a single root (for testing).
    pub fn with_root(root: &Path) -> Self {
        Self {
            log_dir: root.join("logs"),
            cache_dir: root.join("cache"),
            config_dir: root.join("config"),
        }
    }

    /// Directory holding daemon bookkeeping such as the launch lock.
    pub fn daemons_dir(&self) -> PathBuf {
        self.cache_dir.join("daemons")
    }

    /// Creates the cache directory tree. Safe to call repeatedly.
    pub fn ensure_cache_dirs(&self) -> Result<()> {
        for sub in ["daemons", "kube", "sessions"] {
            create_private_dir(&self.cache_dir.join(sub))?;
        }
        Ok(())
    }

    /// Creates the configuration directory tree. Safe to call repeatedly.
    pub fn ensure_config_dir(&self) -> Result<()> {
        create_private_dir(&self.config_dir.join("sessions"))
    }

    /// Makes sure `name` exists in the log directory, readable only by the
    /// current user, and returns its path.
    ///
    /// The root daemon appends to this file. Creating it up front keeps it
    /// owned by the user instead of root.
    pub fn ensure_log_file(&self, name: &str) -> Result<PathBuf> {
        create_private_dir(&self.log_dir)?;
        let path = self.log_dir.join(name);
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.open(&path).map_err(|e| io_context(&path, e))?;
        Ok(path)
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|e| io_context(path, e))
}

fn io_context(path: &Path, e: io::Error) -> Error {
    Error::Io(io::Error::new(
        e.kind(),
        format!("{}: {}", path.display(), e),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let root = tempdir().unwrap();
        let dirs = AppDirs::with_root(root.path());

        dirs.ensure_cache_dirs().unwrap();
        dirs.ensure_cache_dirs().unwrap();
        dirs.ensure_config_dir().unwrap();

        assert!(dirs.daemons_dir().is_dir());
        assert!(dirs.cache_dir.join("kube").is_dir());
        assert!(dirs.config_dir.join("sessions").is_dir());
    }

    #[test]
    fn test_ensure_log_file_keeps_content() {
        let root = tempdir().unwrap();
        let dirs = AppDirs::with_root(root.path());

        let path = dirs.ensure_log_file(DAEMON_LOG).unwrap();
        std::fs::write(&path, "line\n").unwrap();
        dirs.ensure_log_file(DAEMON_LOG).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempdir().unwrap();
        let dirs = AppDirs::with_root(root.path());
        let path = dirs.ensure_log_file(DAEMON_LOG).unwrap();

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        let dir_mode = std::fs::metadata(&dirs.log_dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }
}
