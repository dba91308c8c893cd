//! Shapes of the kubectl JSON output that the CLI reads.

use serde::Deserialize;

/// Response structure for `kubectl get namespaces -o json`.
#[derive(Debug, Deserialize)]
pub struct NamespaceListResponse {
    #[serde(default)]
    pub items: Vec<NamespaceItem>,
}

#[derive(Debug, Deserialize)]
pub struct NamespaceItem {
    pub metadata: NamespaceMetadata,
}

#[derive(Debug, Deserialize)]
pub struct NamespaceMetadata {
    pub name: String,
}

impl NamespaceListResponse {
    /// Namespace names, sorted.
    pub fn into_names(self) -> Vec<String> {
        let mut names: Vec<String> = self
            .items
            .into_iter()
            .map(|item| item.metadata.name)
            .collect();
        names.sort();
        names
    }
}
