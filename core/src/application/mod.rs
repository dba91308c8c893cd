//! Application layer - Use case services.
//!
//! This module contains application services that orchestrate
//! domain logic and adapter interactions.
//!
//! Services are designed to be thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for external dependencies
//! - Return domain types as outputs

mod launch_lock;
mod root_daemon;
mod wait;

pub use launch_lock::LaunchLock;
pub use root_daemon::{skip_reason, DisconnectReport, RootDaemonManager};
pub use wait::{wait_until_running, wait_until_vanishes, POLL_INTERVAL};
