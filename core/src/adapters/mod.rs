//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter handles communication with external systems.

pub mod environment;
pub mod launcher;
pub mod socket;
#[cfg(unix)]
pub mod user_daemon;

// Re-export main types for convenience
pub use environment::{MapEnvironment, ProcessEnvironment};
pub use launcher::PlatformLauncher;
pub use socket::{ControlRequest, ControlResponse};
#[cfg(unix)]
pub use socket::{ControlClient, ControlServer, UnixSocketProbe};
#[cfg(unix)]
pub use user_daemon::SocketUserDaemon;
