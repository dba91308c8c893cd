//! Control socket probe port (interface).

use std::path::Path;

use crate::error::Result;

/// Port for checking on a daemon through its control socket.
pub trait SocketProbe: Send + Sync {
    /// Returns true when a listener accepts connections at `path`.
    ///
    /// A missing socket file and a stale one that refuses connections are
    /// both reported as `Ok(false)`.
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Dials the socket and asks the daemon to quit.
    fn quit(&self, path: &Path) -> impl std::future::Future<Output = Result<()>> + Send;
}
