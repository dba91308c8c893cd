//! Daemon control socket adapters.
//!
//! Only Unix domain sockets are supported.

mod protocol;

#[cfg(unix)]
mod server;
#[cfg(unix)]
mod unix;

pub use protocol::{ControlRequest, ControlResponse};

#[cfg(unix)]
pub use server::ControlServer;
#[cfg(unix)]
pub use unix::{ControlClient, UnixSocketProbe, DIAL_TIMEOUT};
