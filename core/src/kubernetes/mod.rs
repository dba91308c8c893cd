//! Kubernetes module for configuration resolution and namespace discovery.
//!
//! This module provides:
//! - The kubectl flag group and its flag map
//! - Kubeconfig loading with kubectl's merge and override rules
//! - The `telepath.io` cluster extension and the remote override merge
//! - Namespace discovery via kubectl

pub mod discovery;
pub mod errors;
pub mod extension;
pub mod flags;
pub mod kubeconfig;
pub mod models;
pub mod resolver;

// Re-export commonly used types
pub use discovery::KubectlDiscovery;
pub use errors::KubectlError;
pub use extension::{DnsConfig, DnsMapping, KubeconfigExtension, ManagerConfig, EXTENSION_NAME};
pub use flags::{FlagMap, KubeFlagSet, CONTEXT_FLAG};
pub use kubeconfig::{ClientConfigLoader, KubeOverrides, RawKubeconfig, RestConfig};
pub use resolver::{daemon_kubeconfig, resolve_manager_namespace, Kubeconfig};
