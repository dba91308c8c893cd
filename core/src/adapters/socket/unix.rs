//! Unix domain socket probe and client.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use super::protocol::{ControlRequest, ControlResponse};
use crate::error::{Error, Result};
use crate::ports::SocketProbe;

/// How long a dial may take before it is abandoned.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection to a daemon control socket.
pub struct ControlClient {
    stream: BufReader<UnixStream>,
    path: PathBuf,
}

impl ControlClient {
    /// Connects to the socket at `path`, giving up after [`DIAL_TIMEOUT`].
    pub async fn dial(path: &Path) -> Result<Self> {
        Self::dial_with_timeout(path, DIAL_TIMEOUT).await
    }

    pub async fn dial_with_timeout(path: &Path, limit: Duration) -> Result<Self> {
        let stream = match timeout(limit, UnixStream::connect(path)).await {
            Ok(stream) => stream?,
            Err(_) => {
                return Err(Error::Timeout {
                    what: "socket".to_string(),
                    condition: "accept a connection",
                    path: path.to_path_buf(),
                    timeout: limit,
                })
            }
        };
        debug!(path = %path.display(), "dialed control socket");
        Ok(Self {
            stream: BufReader::new(stream),
            path: path.to_path_buf(),
        })
    }

    /// Sends one request and reads the response line.
    pub async fn call(&mut self, request: &ControlRequest) -> Result<ControlResponse> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;

        let mut response = String::new();
        if self.stream.read_line(&mut response).await? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} closed the connection", self.path.display()),
            )));
        }
        Ok(serde_json::from_str(response.trim())?)
    }

    /// Like [`ControlClient::call`] but turns a negative answer into an error.
    pub async fn call_ok(&mut self, daemon: &str, request: &ControlRequest) -> Result<ControlResponse> {
        let response = self.call(request).await?;
        if !response.ok {
            return Err(Error::Rpc {
                daemon: daemon.to_string(),
                method: request.method(),
                message: response.error.unwrap_or_else(|| "request failed".to_string()),
            });
        }
        Ok(response)
    }
}

/// Probes daemon sockets on the local file system.
#[derive(Debug, Clone)]
pub struct UnixSocketProbe {
    daemon: String,
}

impl UnixSocketProbe {
    /// `daemon` names the daemon behind the socket in error messages.
    pub fn new(daemon: impl Into<String>) -> Self {
        Self {
            daemon: daemon.into(),
        }
    }
}

impl Default for UnixSocketProbe {
    fn default() -> Self {
        Self::new("root daemon")
    }
}

impl SocketProbe for UnixSocketProbe {
    async fn exists(&self, path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        match timeout(DIAL_TIMEOUT, UnixStream::connect(path)).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                debug!(path = %path.display(), "stale socket");
                Ok(false)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                debug!(path = %path.display(), "socket did not accept in time");
                Ok(false)
            }
        }
    }

    async fn quit(&self, path: &Path) -> Result<()> {
        let mut client = ControlClient::dial(path).await?;
        client.call_ok(&self.daemon, &ControlRequest::Quit).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_exists_missing_socket() {
        let dir = tempdir().unwrap();
        let probe = UnixSocketProbe::default();
        assert!(!probe.exists(&dir.path().join("none.socket")).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_stale_socket() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stale.socket");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let probe = UnixSocketProbe::default();
        assert!(!probe.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_live_socket() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("live.socket");
        let _listener = tokio::net::UnixListener::bind(&path).unwrap();

        let probe = UnixSocketProbe::default();
        assert!(probe.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_dial_missing_socket_fails() {
        let dir = tempdir().unwrap();
        assert!(ControlClient::dial(&dir.path().join("none")).await.is_err());
    }
}
