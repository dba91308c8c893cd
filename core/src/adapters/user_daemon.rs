//! User daemon reached through its control socket.

use std::path::{Path, PathBuf};

use super::socket::{ControlClient, ControlRequest, UnixSocketProbe};
use crate::error::{Error, Result};
use crate::ports::{SocketProbe, UserDaemon};

/// The user daemon listening on a local socket.
#[derive(Debug, Clone)]
pub struct SocketUserDaemon {
    socket: PathBuf,
    remote: bool,
}

impl SocketUserDaemon {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            remote: false,
        }
    }

    /// Marks the daemon as running outside this host.
    pub fn remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }
}

impl UserDaemon for SocketUserDaemon {
    fn is_remote(&self) -> bool {
        self.remote
    }

    async fn disconnect(&self, quit_daemons: bool) -> Result<()> {
        if !UnixSocketProbe::new("user daemon").exists(&self.socket).await? {
            return Err(Error::NoUserDaemon);
        }
        let mut client = ControlClient::dial(&self.socket).await?;
        client
            .call_ok("user daemon", &ControlRequest::Disconnect { quit_daemons })
            .await?;
        Ok(())
    }
}
