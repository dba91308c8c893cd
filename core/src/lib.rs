//! Telepath Core Library
//!
//! Control-plane core of the telepath client. Provides functionality to:
//! - Derive a stable session identifier from kube context and namespace
//! - Capture connect requests from flags and environment
//! - Resolve kubeconfig, the `telepath.io` cluster extension and the
//!   traffic manager namespace
//! - Start, probe and stop the privileged root daemon
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - macOS / Linux: Unix socket control channel, `sudo` elevation
//! - Windows: elevation through PowerShell (no socket probe)

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;
pub mod filelocation;
mod humantime_serde;
pub mod kubernetes;
pub mod request;

// Re-export domain types (primary API)
pub use domain::{DaemonState, EnsureOutcome, Identifier, SkipReason, Subnet};

// Re-export other commonly used types
pub use application::{DisconnectReport, RootDaemonManager};
pub use config::{ClientConfig, ConfigStore, Env};
pub use error::{Category, Error, Result};
pub use filelocation::AppDirs;
pub use kubernetes::{Kubeconfig, KubeconfigExtension};
pub use request::{ConnectArgs, ConnectRequest, GlobalFlags};
