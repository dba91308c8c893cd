//! Errors from running kubectl against the cluster.

use thiserror::Error;

/// Result type alias for kubectl operations.
pub type Result<T> = std::result::Result<T, KubectlError>;

/// Errors produced by live cluster calls made through kubectl.
#[derive(Error, Debug)]
pub enum KubectlError {
    /// kubectl is not installed or could not be found.
    #[error("kubectl not found")]
    KubectlNotFound,

    /// The cluster could not be reached.
    #[error("cluster not reachable: {0}")]
    ClusterNotConnected(String),

    /// kubectl exited with an error.
    #[error("kubectl failed: {0}")]
    CommandFailed(String),

    /// kubectl output could not be parsed.
    #[error("failed to parse kubectl output: {0}")]
    ParsingFailed(String),

    /// A stored kubectl flag value could not be turned into arguments.
    #[error("invalid value for kubectl flag --{flag}: {message}")]
    InvalidFlag { flag: String, message: String },

    /// kubectl did not finish in time.
    #[error("kubectl timed out")]
    Timeout,

    /// I/O error while running kubectl.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KubectlError {
    /// Classifies kubectl stderr output.
    pub fn from_kubectl_error(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();
        if lower.contains("connection refused")
            || lower.contains("no configuration has been provided")
            || lower.contains("dial tcp")
            || lower.contains("unable to connect to the server")
        {
            Self::ClusterNotConnected(message)
        } else {
            Self::CommandFailed(message)
        }
    }

    /// Returns true when the error means the cluster could not be reached.
    pub fn is_cluster_not_connected(&self) -> bool {
        matches!(self, Self::ClusterNotConnected(_))
    }
}
