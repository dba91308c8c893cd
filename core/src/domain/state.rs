//! Lifecycle states of the root daemon as seen from the CLI.

use std::fmt;

/// State of the root daemon.
///
/// The CLI never keeps a handle on the daemon process; every state is derived
/// from the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaemonState {
    #[default]
    NotRunning,
    Launching,
    AwaitingSocket,
    Running,
    Quitting,
    Vanished,
}

impl DaemonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRunning => "not running",
            Self::Launching => "launching",
            Self::AwaitingSocket => "awaiting socket",
            Self::Running => "running",
            Self::Quitting => "quitting",
            Self::Vanished => "vanished",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: DaemonState) -> bool {
        use DaemonState::*;
        matches!(
            (self, next),
            (NotRunning, Launching)
                | (NotRunning, Running)
                | (Launching, AwaitingSocket)
                | (AwaitingSocket, Running)
                | (Running, Quitting)
                | (Quitting, Vanished)
        )
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why `ensure_running` decided not to touch the root daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The user daemon runs elsewhere and manages its own root daemon.
    RemoteUserDaemon,
    /// The daemons run in a container.
    Docker,
    /// An explicit user daemon address is configured.
    UserDaemonAddress,
}

/// Result of making sure the root daemon runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The socket was already answering; nothing was spawned.
    AlreadyRunning,
    /// The daemon was launched by this invocation and is now ready.
    Launched,
    /// Another invocation launched the daemon while this one waited for the lock.
    StartedElsewhere,
    /// The root daemon is not managed by this invocation.
    Skipped(SkipReason),
}
