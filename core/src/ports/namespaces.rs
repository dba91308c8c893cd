//! Namespace listing port (interface).

use crate::error::Result;
use crate::kubernetes::FlagMap;

/// Port for listing the namespaces of a cluster.
pub trait NamespaceLister: Send + Sync {
    /// Lists namespace names using the given kubectl flags.
    fn list_namespaces(
        &self,
        kube_flags: &FlagMap,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}
