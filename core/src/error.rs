//! Error types for the telepath-core library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::kubernetes::errors::KubectlError;

/// Result type alias for telepath operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an error, used by the CLI to decide how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Bad input from the user (flag values, patterns, missing namespace).
    User,
    /// Broken or inconsistent configuration (kubeconfig, extension blobs).
    Config,
    /// A failure the daemons had no part in, such as a live cluster call.
    NoDaemonLogs,
    /// A bounded wait ran out of time.
    Timeout,
    /// A daemon failed to start or to answer.
    Daemon,
    /// Anything else.
    Unknown,
}

/// Errors that can occur while resolving configuration and managing daemons.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid user supplied value.
    #[error("{0}")]
    InvalidConfig(String),

    /// Kubeconfig or extension problem.
    #[error("{0}")]
    Config(String),

    /// A failure that should not point the user at the daemon logs.
    #[error("{0}")]
    NoDaemonLogs(String),

    /// Failed to spawn the root daemon.
    #[error("failed to launch the daemon service: {0}")]
    Launch(#[source] std::io::Error),

    /// The root daemon was launched but never became ready.
    #[error("daemon service did not start: {0}")]
    DaemonStart(#[source] Box<Error>),

    /// A socket did not reach the expected state within the given time.
    #[error("timeout while waiting for {what} to {condition} at {}", .path.display())]
    Timeout {
        what: String,
        condition: &'static str,
        path: PathBuf,
        timeout: Duration,
    },

    /// A wait was aborted through its cancellation token.
    #[error("cancelled while waiting for {0}")]
    Cancelled(String),

    /// Another daemon already serves the socket path.
    #[error("a daemon is already listening on {}", .0.display())]
    AlreadyRunning(PathBuf),

    /// No user daemon is running.
    #[error("the user daemon is not running")]
    NoUserDaemon,

    /// A daemon answered a control request with an error.
    #[error("{daemon} rejected {method}: {message}")]
    Rpc {
        daemon: String,
        method: &'static str,
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Kubernetes/kubectl error.
    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] KubectlError),
}

impl Error {
    /// Returns the category that decides how the error is reported.
    pub fn category(&self) -> Category {
        match self {
            Self::InvalidConfig(_) => Category::User,
            Self::Config(_) => Category::Config,
            Self::NoDaemonLogs(_) | Self::Kubernetes(_) => Category::NoDaemonLogs,
            Self::Timeout { .. } | Self::Cancelled(_) => Category::Timeout,
            Self::DaemonStart(inner) => match inner.category() {
                Category::Timeout => Category::Timeout,
                _ => Category::Daemon,
            },
            Self::Launch(_) | Self::AlreadyRunning(_) | Self::NoUserDaemon | Self::Rpc { .. } => {
                Category::Daemon
            }
            Self::Io(_) | Self::Json(_) => Category::Unknown,
        }
    }

    /// Whether the user should be told to look at the daemon logs.
    pub fn shows_daemon_logs(&self) -> bool {
        !matches!(
            self.category(),
            Category::User | Category::Config | Category::NoDaemonLogs
        )
    }

    /// Whether a bounded wait ran out of time somewhere in this error.
    pub fn is_timeout(&self) -> bool {
        self.category() == Category::Timeout
    }

    /// Re-classifies this error as one that does not involve the daemons.
    pub fn no_daemon_logs(self, context: &str) -> Self {
        match self.category() {
            Category::User | Category::Config | Category::NoDaemonLogs => self,
            _ => Self::NoDaemonLogs(format!("{}: {}", context, self)),
        }
    }
}
