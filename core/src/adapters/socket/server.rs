//! Serves the control protocol on a Unix domain socket.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::protocol::{ControlRequest, ControlResponse};
use crate::error::{Error, Result};

/// Listens on a daemon socket and answers control requests.
///
/// `Quit` and `Disconnect { quit_daemons: true }` cancel the server token
/// once the response is written. The socket file is removed on drop.
pub struct ControlServer {
    listener: Option<UnixListener>,
    socket_path: PathBuf,
    version: String,
}

impl ControlServer {
    /// Binds the socket, replacing a stale socket file left by a crash.
    ///
    /// Fails with [`Error::AlreadyRunning`] when a listener still accepts
    /// connections on `socket_path`.
    pub fn bind(socket_path: &Path, version: impl Into<String>) -> Result<Self> {
        if socket_path.exists() {
            match std::os::unix::net::UnixStream::connect(socket_path) {
                Ok(_) => return Err(Error::AlreadyRunning(socket_path.to_path_buf())),
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    warn!(path = %socket_path.display(), "removing stale socket file");
                    std::fs::remove_file(socket_path)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        {
            use std::os::unix::fs::PermissionsExt;
            // The root daemon is dialed by unprivileged CLI processes.
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o666))?;
        }
        info!(path = %socket_path.display(), "control socket listening");

        Ok(Self {
            listener: Some(listener),
            socket_path: socket_path.to_path_buf(),
            version: version.into(),
        })
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the accept loop until `cancel` fires.
    pub async fn serve(mut self, cancel: CancellationToken) -> Result<()> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("control socket server cancelled");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let cancel = cancel.clone();
                            let version = self.version.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, &version, &cancel).await {
                                    error!("control connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!(path = %self.socket_path.display(), "accept error: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }

        drop(listener);
        Ok(())
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!("failed to remove socket file: {}", e);
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    version: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            debug!("control client disconnected");
            return Ok(());
        }

        let (response, stop) = match serde_json::from_str::<ControlRequest>(line.trim()) {
            Ok(request) => {
                debug!(method = request.method(), "control request");
                dispatch(&request, version)
            }
            Err(e) => (ControlResponse::error(e.to_string()), false),
        };

        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        let stream = reader.get_mut();
        stream.write_all(out.as_bytes()).await?;
        stream.flush().await?;

        if stop {
            info!("quit requested");
            cancel.cancel();
            return Ok(());
        }
    }
}

fn dispatch(request: &ControlRequest, version: &str) -> (ControlResponse, bool) {
    match request {
        ControlRequest::Quit => (ControlResponse::ok(), true),
        ControlRequest::Disconnect { quit_daemons } => (ControlResponse::ok(), *quit_daemons),
        ControlRequest::Version => (ControlResponse::version(version), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_dispatch() {
        assert_eq!(dispatch(&ControlRequest::Quit, "1.0"), (ControlResponse::ok(), true));
        assert_eq!(
            dispatch(&ControlRequest::Disconnect { quit_daemons: false }, "1.0"),
            (ControlResponse::ok(), false)
        );
        let (version, stop) = dispatch(&ControlRequest::Version, "1.0");
        assert_eq!(version.version.as_deref(), Some("1.0"));
        assert!(!stop);
    }

    #[tokio::test]
    async fn test_bind_refuses_live_socket() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rootd.socket");
        let first = ControlServer::bind(&path, "1.0").unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(first.serve(cancel.clone()));

        let err = ControlServer::bind(&path, "2.0").err().unwrap();
        assert!(matches!(err, Error::AlreadyRunning(ref p) if p == &path));
        assert!(path.exists());

        cancel.cancel();
        handle.await.unwrap().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rootd.socket");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let server = ControlServer::bind(&path, "1.0").unwrap();
        assert!(std::os::unix::net::UnixStream::connect(&path).is_ok());
        drop(server);
        assert!(!path.exists());
    }
}
