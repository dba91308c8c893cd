//! Domain layer - Pure data models.
//!
//! These types have no I/O dependencies beyond identifier resolution and can
//! be tested in isolation.

mod identifier;
mod state;
mod subnet;

pub use identifier::{safe_container_name, Identifier};
pub use state::{DaemonState, EnsureOutcome, SkipReason};
pub use subnet::Subnet;
