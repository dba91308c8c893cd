//! Elevated process launch port (interface).

use std::path::Path;

use crate::error::Result;

/// Port for starting a detached process with administrator privileges.
pub trait ElevatedLauncher: Send + Sync {
    /// Starts `args[0]` with the remaining arguments in `work_dir`.
    ///
    /// Resolves once the process has been spawned. It does not wait for the
    /// process to become ready.
    fn launch_elevated(
        &self,
        args: &[String],
        work_dir: &Path,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
