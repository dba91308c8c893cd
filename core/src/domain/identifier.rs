//! Session identifier derived from the kube context and namespace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kubernetes::ClientConfigLoader;

/// Longest name accepted by container runtimes and most file systems.
const MAX_NAME_LENGTH: usize = 64;

/// Prefix of the container name used for a containerized daemon.
const CONTAINER_PREFIX: &str = "tp-";

/// Identifies one daemon session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    /// Sanitized session name.
    pub name: String,
    /// Kube context, empty when running in-cluster.
    pub kube_context: String,
    /// Namespace, never empty.
    pub namespace: String,
}

impl Identifier {
    /// Creates an identifier, deriving the name from context and namespace when
    /// `name` is empty.
    pub fn new(name: &str, context_name: &str, namespace: &str) -> Result<Self> {
        if namespace.is_empty() {
            return Err(Error::InvalidConfig(
                "daemon identifier must have a namespace".to_string(),
            ));
        }

        let name = if !name.is_empty() {
            name.to_string()
        } else if context_name.is_empty() {
            // No context means an in-cluster config
            format!("in-cluster-{}", namespace)
        } else {
            format!("{}-{}", context_name, namespace)
        };

        let safe = safe_container_name(&name);
        if safe.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "daemon name {:?} contains no usable characters",
                name
            )));
        }

        Ok(Self {
            name: safe,
            kube_context: context_name.to_string(),
            namespace: namespace.to_string(),
        })
    }

    /// Creates an identifier from the context and namespace that the kubectl
    /// flags in `flag_map` select.
    pub fn from_flags(name: &str, flag_map: &BTreeMap<String, String>) -> Result<Self> {
        let loader = ClientConfigLoader::new(flag_map)?;
        Self::from_loader(name, &loader)
    }

    /// Same as [`Identifier::from_flags`] with an explicit loader.
    pub fn from_loader(name: &str, loader: &ClientConfigLoader) -> Result<Self> {
        let raw = loader.raw_config()?;
        if raw.contexts.is_empty() {
            return Err(Error::Config("kubeconfig has no context definition".to_string()));
        }
        let namespace = loader.namespace(&raw);
        let context_name = loader.context_name(&raw);
        Self::new(name, &context_name, &namespace)
    }

    /// Name of the file that holds information about the running session.
    pub fn info_file_name(&self) -> String {
        format!("{}.json", self.name)
    }

    /// Name of the container that runs a containerized daemon for the session.
    pub fn container_name(&self) -> String {
        format!("{}{}", CONTAINER_PREFIX, self.name)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Turns `name` into something usable as a container name and a file name.
///
/// The result is lowercase, consists of `[a-z0-9-]`, never starts or ends with
/// a dash and never contains two dashes in a row.
pub fn safe_container_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.truncate(MAX_NAME_LENGTH);
    while out.ends_with('-') {
        out.pop();
    }
    out
}
