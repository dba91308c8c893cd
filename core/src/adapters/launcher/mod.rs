//! Elevated launcher adapters.
//!
//! Platform-specific implementations of starting a privileged daemon.

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

use std::path::Path;

use crate::error::Result;
use crate::ports::ElevatedLauncher;

/// The launcher for the current platform.
pub struct PlatformLauncher {
    #[cfg(unix)]
    inner: unix::UnixLauncher,

    #[cfg(windows)]
    inner: windows::WindowsLauncher,
}

impl PlatformLauncher {
    /// Create a new launcher for the current platform.
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            inner: unix::UnixLauncher::new(),

            #[cfg(windows)]
            inner: windows::WindowsLauncher::new(),
        }
    }
}

impl Default for PlatformLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ElevatedLauncher for PlatformLauncher {
    async fn launch_elevated(&self, args: &[String], work_dir: &Path) -> Result<()> {
        self.inner.launch(args, work_dir).await
    }
}
