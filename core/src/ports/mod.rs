//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod environment;
mod launcher;
mod namespaces;
mod socket;
mod user_daemon;

pub use environment::Environment;
pub use launcher::ElevatedLauncher;
pub use namespaces::NamespaceLister;
pub use socket::SocketProbe;
pub use user_daemon::UserDaemon;
