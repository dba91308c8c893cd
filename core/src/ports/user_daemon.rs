//! User daemon port (interface).

use crate::error::Result;

/// Port for the user-level connector daemon.
pub trait UserDaemon: Send + Sync {
    /// True when the user daemon runs elsewhere, in which case it also owns
    /// the root daemon.
    fn is_remote(&self) -> bool;

    /// Disconnects the session, optionally asking the daemons to quit.
    ///
    /// Returns [`Error::NoUserDaemon`](crate::Error::NoUserDaemon) when no
    /// user daemon is running.
    fn disconnect(
        &self,
        quit_daemons: bool,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
