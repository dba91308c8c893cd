//! Namespace discovery using kubectl.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::errors::{KubectlError, Result};
use super::flags::{decode_csv, lookup, FlagKind, FlagMap};
use super::models::NamespaceListResponse;
use crate::ports::NamespaceLister;

/// Default paths to search for kubectl before falling back to `PATH`.
const KUBECTL_PATHS: &[&str] = &[
    "/opt/homebrew/bin/kubectl", // Apple Silicon
    "/usr/local/bin/kubectl",    // Intel Mac / Homebrew
    "/usr/bin/kubectl",          // System
];

/// Timeout for kubectl discovery commands.
const KUBECTL_TIMEOUT: Duration = Duration::from_secs(15);

/// Lists namespaces by running kubectl with the user's kube flags.
pub struct KubectlDiscovery {
    kubectl_path: Option<PathBuf>,
}

impl KubectlDiscovery {
    /// Creates a new KubectlDiscovery, searching for kubectl.
    pub fn new() -> Self {
        let path_var = std::env::var_os("PATH");
        Self {
            kubectl_path: find_executable(KUBECTL_PATHS).or_else(|| {
                path_var.and_then(|p| {
                    std::env::split_paths(&p)
                        .map(|dir| dir.join(kubectl_binary()))
                        .find(|candidate| candidate.is_file())
                })
            }),
        }
    }

    /// Creates a new KubectlDiscovery with a custom kubectl path.
    pub fn with_path(kubectl_path: Option<PathBuf>) -> Self {
        Self { kubectl_path }
    }

    /// Returns the kubectl path if found.
    pub fn kubectl_path(&self) -> Option<&PathBuf> {
        self.kubectl_path.as_ref()
    }

    /// Fetches all namespace names visible with the given flags.
    pub async fn fetch_namespaces(&self, kube_flags: &FlagMap) -> Result<Vec<String>> {
        let mut args = flag_args(kube_flags)?;
        args.extend(["get", "namespaces", "-o", "json"].map(String::from));
        if !kube_flags.contains_key("request-timeout") {
            args.push("--request-timeout=10s".to_string());
        }

        let output = self.execute_kubectl(&args).await?;
        let response: NamespaceListResponse = serde_json::from_str(&output)
            .map_err(|e| KubectlError::ParsingFailed(e.to_string()))?;
        Ok(response.into_names())
    }

    /// Executes a kubectl command and returns the output.
    async fn execute_kubectl(&self, args: &[String]) -> Result<String> {
        let kubectl_path = self
            .kubectl_path
            .as_ref()
            .ok_or(KubectlError::KubectlNotFound)?;
        debug!(kubectl = %kubectl_path.display(), ?args, "running kubectl");

        let result = timeout(KUBECTL_TIMEOUT, async {
            let output = Command::new(kubectl_path).args(args).output().await?;

            Ok::<_, std::io::Error>((output.status, output.stdout, output.stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    String::from_utf8(stdout)
                        .map_err(|e| KubectlError::ParsingFailed(e.to_string()))
                } else {
                    let stderr_str = String::from_utf8_lossy(&stderr);
                    Err(KubectlError::from_kubectl_error(&stderr_str))
                }
            }
            Ok(Err(e)) => Err(KubectlError::Io(e)),
            Err(_) => Err(KubectlError::Timeout),
        }
    }
}

impl Default for KubectlDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceLister for KubectlDiscovery {
    async fn list_namespaces(&self, kube_flags: &FlagMap) -> crate::Result<Vec<String>> {
        Ok(self.fetch_namespaces(kube_flags).await?)
    }
}

/// Turns a flag map into `--name=value` arguments. List flags are decoded
/// and repeated once per value.
fn flag_args(kube_flags: &FlagMap) -> Result<Vec<String>> {
    let mut args = Vec::with_capacity(kube_flags.len());
    for (name, value) in kube_flags {
        if lookup(name).map(|f| f.kind) == Some(FlagKind::List) {
            let values = decode_csv(value).map_err(|e| KubectlError::InvalidFlag {
                flag: name.clone(),
                message: e,
            })?;
            args.extend(values.into_iter().map(|v| format!("--{}={}", name, v)));
        } else {
            args.push(format!("--{}={}", name, value));
        }
    }
    Ok(args)
}

fn kubectl_binary() -> &'static str {
    if cfg!(windows) {
        "kubectl.exe"
    } else {
        "kubectl"
    }
}

/// Finds an executable in the given paths.
fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    paths.iter().map(PathBuf::from).find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_executable() {
        let result = find_executable(&["/nonexistent/path", "/bin/sh"]);
        assert_eq!(result, Some(PathBuf::from("/bin/sh")));

        let result = find_executable(&["/nonexistent/path"]);
        assert!(result.is_none());
    }

    #[test]
    fn test_flag_args() {
        let mut flags = FlagMap::new();
        flags.insert("context".into(), "dev".into());
        flags.insert("as-group".into(), "devs,ops".into());
        assert_eq!(
            flag_args(&flags).unwrap(),
            vec!["--as-group=devs", "--as-group=ops", "--context=dev"]
        );
    }

    #[test]
    fn test_flag_args_decodes_quoted_values() {
        let mut flags = FlagMap::new();
        flags.insert(
            "as-group".into(),
            super::super::flags::encode_csv(["a,b", "c"]),
        );
        flags.insert("namespace".into(), "x,y".into());
        assert_eq!(
            flag_args(&flags).unwrap(),
            vec!["--as-group=a,b", "--as-group=c", "--namespace=x,y"]
        );

        flags.insert("as-group".into(), "\"open".into());
        assert!(matches!(
            flag_args(&flags),
            Err(KubectlError::InvalidFlag { ref flag, .. }) if flag == "as-group"
        ));
    }

    #[tokio::test]
    async fn test_missing_kubectl() {
        let discovery = KubectlDiscovery::with_path(None);
        let err = discovery.fetch_namespaces(&FlagMap::new()).await.unwrap_err();
        assert!(matches!(err, KubectlError::KubectlNotFound));
    }
}
