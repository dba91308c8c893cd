//! Raw kubeconfig model and the loader that applies kubectl flag overrides.
//!
//! The loader follows kubectl's rules: `--kubeconfig` names a single file that
//! must exist, otherwise every file on the `KUBECONFIG` path list is merged
//! (the first file to define a name wins), otherwise `~/.kube/config` is used.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::flags::{self, decode_csv, FlagKind, FlagMap, CONTEXT_FLAG};
use crate::adapters::ProcessEnvironment;
use crate::error::{Error, Result};
use crate::ports::Environment;

/// Namespace used when neither flags nor the context name one.
pub const DEFAULT_NAMESPACE: &str = "default";

// ============================================================================
// Raw Model
// ============================================================================

/// A kubeconfig file, or several merged into one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawKubeconfig {
    #[serde(default)]
    pub current_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<NamedContext>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    #[serde(default)]
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extensions: Vec<NamedExtension>,
}

/// A tool specific extension embedded in a cluster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedExtension {
    pub name: String,
    #[serde(default)]
    pub extension: serde_yaml::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub impersonate: Option<String>,
    #[serde(default, rename = "as-groups", skip_serializing_if = "Vec::is_empty")]
    pub impersonate_groups: Vec<String>,
    #[serde(default, rename = "as-uid", skip_serializing_if = "Option::is_none")]
    pub impersonate_uid: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawKubeconfig {
    /// Parses a kubeconfig document.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("unable to parse kubeconfig: {}", e)))
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.context)
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.cluster)
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name).map(|u| &u.user)
    }

    /// Names of all clusters, in file order.
    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters.iter().map(|c| c.name.clone()).collect()
    }

    /// Merges `other` into `self`. Entries already present win.
    fn merge(&mut self, other: RawKubeconfig) {
        if self.current_context.is_empty() {
            self.current_context = other.current_context;
        }
        for cluster in other.clusters {
            if self.cluster(&cluster.name).is_none() {
                self.clusters.push(cluster);
            }
        }
        for context in other.contexts {
            if self.context(&context.name).is_none() {
                self.contexts.push(context);
            }
        }
        for user in other.users {
            if self.user(&user.name).is_none() {
                self.users.push(user);
            }
        }
    }

    /// Makes file references relative to the directory of the kubeconfig file.
    fn resolve_paths(&mut self, base: &Path) {
        let fix = |p: &mut Option<PathBuf>| {
            if let Some(path) = p {
                if path.is_relative() && !path.as_os_str().is_empty() {
                    *path = base.join(&*path);
                }
            }
        };
        for c in &mut self.clusters {
            fix(&mut c.cluster.certificate_authority);
        }
        for u in &mut self.users {
            fix(&mut u.user.token_file);
            fix(&mut u.user.client_certificate);
            fix(&mut u.user.client_key);
        }
    }
}

// ============================================================================
// Flag Overrides
// ============================================================================

/// Typed view of a kubectl flag map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KubeOverrides {
    pub kubeconfig: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub certificate_authority: Option<PathBuf>,
    pub client_certificate: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub token: Option<String>,
    pub impersonate: Option<String>,
    pub impersonate_groups: Vec<String>,
    pub impersonate_uid: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub tls_server_name: Option<String>,
    pub insecure_skip_tls_verify: bool,
    pub cluster: Option<String>,
    pub user: Option<String>,
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub request_timeout: Option<String>,
    pub disable_compression: bool,
}

impl KubeOverrides {
    /// Builds overrides from a flag map. Unknown keys are skipped.
    pub fn from_flag_map(flag_map: &FlagMap) -> Result<Self> {
        let mut o = Self::default();
        for (key, value) in flag_map {
            let kind = if key == CONTEXT_FLAG {
                FlagKind::Text
            } else if let Some(flag) = flags::lookup(key) {
                flag.kind
            } else {
                debug!(flag = %key, "ignoring unknown kubectl flag");
                continue;
            };

            let invalid = |e: String| {
                Error::InvalidConfig(format!(
                    "error processing kubectl flag --{}={}: {}",
                    key, value, e
                ))
            };
            match kind {
                FlagKind::List => {
                    let values = decode_csv(value).map_err(invalid)?;
                    if key == "as-group" {
                        o.impersonate_groups = values.into_iter().filter(|v| !v.is_empty()).collect();
                    }
                }
                FlagKind::Bool => {
                    let b = value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?;
                    match key.as_str() {
                        "insecure-skip-tls-verify" => o.insecure_skip_tls_verify = b,
                        "disable-compression" => o.disable_compression = b,
                        _ => {}
                    }
                }
                FlagKind::Text => {
                    let v = Some(value.clone());
                    match key.as_str() {
                        "kubeconfig" => o.kubeconfig = v.map(PathBuf::from),
                        "cache-dir" => o.cache_dir = v.map(PathBuf::from),
                        "certificate-authority" => o.certificate_authority = v.map(PathBuf::from),
                        "client-certificate" => o.client_certificate = v.map(PathBuf::from),
                        "client-key" => o.client_key = v.map(PathBuf::from),
                        "token" => o.token = v,
                        "as" => o.impersonate = v,
                        "as-uid" => o.impersonate_uid = v,
                        "username" => o.username = v,
                        "password" => o.password = v,
                        "server" => o.server = v,
                        "tls-server-name" => o.tls_server_name = v,
                        "cluster" => o.cluster = v,
                        "user" => o.user = v,
                        "namespace" => o.namespace = v,
                        "request-timeout" => {
                            parse_request_timeout(value).map_err(invalid)?;
                            o.request_timeout = v;
                        }
                        CONTEXT_FLAG => o.context = v,
                        _ => {}
                    }
                }
            }
        }
        Ok(o)
    }
}

/// Parses a kubectl request timeout: a bare number means seconds, `0` means
/// no timeout.
pub fn parse_request_timeout(value: &str) -> std::result::Result<Option<Duration>, String> {
    let value = value.trim();
    let timeout = if let Ok(secs) = value.parse::<u64>() {
        Duration::from_secs(secs)
    } else {
        humantime::parse_duration(value).map_err(|e| e.to_string())?
    };
    Ok((!timeout.is_zero()).then_some(timeout))
}

// ============================================================================
// Rest Config
// ============================================================================

/// What a client needs to talk to the API server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestConfig {
    pub host: String,
    pub tls_server_name: Option<String>,
    pub insecure: bool,
    pub ca_file: Option<PathBuf>,
    pub ca_data: Option<String>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub bearer_token: Option<String>,
    pub bearer_token_file: Option<PathBuf>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub impersonate: Option<String>,
    pub impersonate_groups: Vec<String>,
    pub impersonate_uid: Option<String>,
    pub proxy_url: Option<String>,
    pub timeout: Option<Duration>,
    pub disable_compression: bool,
}

// ============================================================================
// Loader
// ============================================================================

/// Loads kubeconfig files and applies kubectl flag overrides.
#[derive(Debug, Clone)]
pub struct ClientConfigLoader {
    flag_map: FlagMap,
    overrides: KubeOverrides,
    search_paths: Vec<PathBuf>,
}

impl ClientConfigLoader {
    /// Creates a loader that honors the flags in `flag_map` and the
    /// `KUBECONFIG` environment variable.
    pub fn new(flag_map: &FlagMap) -> Result<Self> {
        Self::from_environment(flag_map, &ProcessEnvironment)
    }

    /// Like [`ClientConfigLoader::new`] but reads `KUBECONFIG` from `env`.
    pub fn from_environment(flag_map: &FlagMap, env: &impl Environment) -> Result<Self> {
        let kubeconfig = env.var("KUBECONFIG").map(std::ffi::OsString::from);
        let paths = search_paths(kubeconfig.as_deref(), dirs::home_dir().as_deref());
        Self::with_search_paths(flag_map, paths)
    }

    /// Creates a loader with an explicit list of files to merge.
    pub fn with_search_paths(flag_map: &FlagMap, search_paths: Vec<PathBuf>) -> Result<Self> {
        Ok(Self {
            flag_map: flag_map.clone(),
            overrides: KubeOverrides::from_flag_map(flag_map)?,
            search_paths,
        })
    }

    /// The flag map the loader was created from.
    pub fn flag_map(&self) -> &FlagMap {
        &self.flag_map
    }

    pub fn overrides(&self) -> &KubeOverrides {
        &self.overrides
    }

    /// Loads and merges the kubeconfig files.
    pub fn raw_config(&self) -> Result<RawKubeconfig> {
        if let Some(explicit) = &self.overrides.kubeconfig {
            return load_file(explicit);
        }

        let mut merged = RawKubeconfig::default();
        for path in &self.search_paths {
            if !path.exists() {
                debug!(path = %path.display(), "skipping missing kubeconfig");
                continue;
            }
            merged.merge(load_file(path)?);
        }
        Ok(merged)
    }

    /// Name of the selected context: the `context` flag or the current context.
    pub fn context_name(&self, raw: &RawKubeconfig) -> String {
        match &self.overrides.context {
            Some(c) if !c.is_empty() => c.clone(),
            _ => raw.current_context.clone(),
        }
    }

    /// The namespace for requests: flag, then context, then `default`.
    pub fn namespace(&self, raw: &RawKubeconfig) -> String {
        if let Some(ns) = self.overrides.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            return ns.to_string();
        }
        raw.context(&self.context_name(raw))
            .and_then(|c| c.namespace.clone())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    /// Name of the cluster to use: the `cluster` flag or the context's cluster.
    pub fn cluster_name(&self, raw: &RawKubeconfig) -> Option<String> {
        match &self.overrides.cluster {
            Some(c) if !c.is_empty() => Some(c.clone()),
            _ => raw.context(&self.context_name(raw)).map(|c| c.cluster.clone()),
        }
    }

    /// Builds the client configuration for the selected context.
    pub fn client_config(&self, raw: &RawKubeconfig) -> Result<RestConfig> {
        let o = &self.overrides;
        let context_name = self.context_name(raw);
        let context = raw.context(&context_name).cloned().unwrap_or_default();
        let cluster_name = self.cluster_name(raw).unwrap_or_default();
        let cluster = raw.cluster(&cluster_name).cloned().unwrap_or_default();
        let user_name = o.user.clone().unwrap_or(context.user);
        let user = raw.user(&user_name).cloned().unwrap_or_default();

        let host = o.server.clone().unwrap_or(cluster.server);
        if host.is_empty() {
            return Err(Error::Config(format!(
                "no server found for cluster {:?} in context {:?}",
                cluster_name, context_name
            )));
        }

        let timeout = match &o.request_timeout {
            Some(t) => parse_request_timeout(t).map_err(Error::InvalidConfig)?,
            None => None,
        };

        Ok(RestConfig {
            host,
            tls_server_name: o.tls_server_name.clone().or(cluster.tls_server_name),
            insecure: o.insecure_skip_tls_verify || cluster.insecure_skip_tls_verify,
            ca_file: o.certificate_authority.clone().or(cluster.certificate_authority),
            ca_data: cluster.certificate_authority_data,
            cert_file: o.client_certificate.clone().or(user.client_certificate),
            key_file: o.client_key.clone().or(user.client_key),
            bearer_token: o.token.clone().or(user.token),
            bearer_token_file: user.token_file,
            username: o.username.clone().or(user.username),
            password: o.password.clone().or(user.password),
            impersonate: o.impersonate.clone().or(user.impersonate),
            impersonate_groups: if o.impersonate_groups.is_empty() {
                user.impersonate_groups
            } else {
                o.impersonate_groups.clone()
            },
            impersonate_uid: o.impersonate_uid.clone().or(user.impersonate_uid),
            proxy_url: cluster.proxy_url,
            timeout,
            disable_compression: o.disable_compression,
        })
    }
}

/// Files to merge given the value of `KUBECONFIG` and the home directory.
pub fn search_paths(kubeconfig_env: Option<&OsStr>, home: Option<&Path>) -> Vec<PathBuf> {
    if let Some(value) = kubeconfig_env.filter(|v| !v.is_empty()) {
        return std::env::split_paths(value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
    }
    home.map(|h| vec![h.join(".kube").join("config")])
        .unwrap_or_default()
}

fn load_file(path: &Path) -> Result<RawKubeconfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("unable to read kubeconfig {}: {}", path.display(), e))
    })?;
    let mut raw = RawKubeconfig::parse(&content).map_err(|e| {
        Error::Config(format!("{} ({})", e, path.display()))
    })?;
    if let Some(base) = path.parent() {
        raw.resolve_paths(base);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: dev-cluster
  cluster:
    server: https://dev.example.com:6443
    certificate-authority: ca.crt
- name: prod-cluster
  cluster:
    server: https://prod.example.com:6443
    insecure-skip-tls-verify: true
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: dev-user
    namespace: dev-ns
- name: prod
  context:
    cluster: prod-cluster
    user: prod-user
users:
- name: dev-user
  user:
    token: dev-token
- name: prod-user
  user:
    client-certificate: /certs/prod.crt
    client-key: /certs/prod.key
"#;

    fn flags(pairs: &[(&str, &str)]) -> FlagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_current_context_and_namespace() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "config", KUBECONFIG);
        let loader = ClientConfigLoader::with_search_paths(&FlagMap::new(), vec![path]).unwrap();
        let raw = loader.raw_config().unwrap();

        assert_eq!(loader.context_name(&raw), "dev");
        assert_eq!(loader.namespace(&raw), "dev-ns");

        let rest = loader.client_config(&raw).unwrap();
        assert_eq!(rest.host, "https://dev.example.com:6443");
        assert_eq!(rest.bearer_token.as_deref(), Some("dev-token"));
        assert_eq!(rest.ca_file, Some(dir.path().join("ca.crt")));
    }

    #[test]
    fn test_flags_override_context_and_namespace() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "config", KUBECONFIG);
        let loader = ClientConfigLoader::with_search_paths(
            &flags(&[("context", "prod"), ("namespace", "team"), ("server", "https://other:443")]),
            vec![path],
        )
        .unwrap();
        let raw = loader.raw_config().unwrap();

        assert_eq!(loader.context_name(&raw), "prod");
        assert_eq!(loader.namespace(&raw), "team");

        let rest = loader.client_config(&raw).unwrap();
        assert_eq!(rest.host, "https://other:443");
        assert!(rest.insecure);
        assert_eq!(rest.cert_file, Some(PathBuf::from("/certs/prod.crt")));
    }

    #[test]
    fn test_namespace_defaults() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "config", KUBECONFIG);
        let loader =
            ClientConfigLoader::with_search_paths(&flags(&[("context", "prod")]), vec![path]).unwrap();
        let raw = loader.raw_config().unwrap();
        assert_eq!(loader.namespace(&raw), DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_merge_first_file_wins() {
        let dir = tempdir().unwrap();
        let first = write(
            dir.path(),
            "first",
            r#"
current-context: a
clusters:
- name: shared
  cluster:
    server: https://first
contexts:
- name: a
  context:
    cluster: shared
"#,
        );
        let second = write(
            dir.path(),
            "second",
            r#"
current-context: b
clusters:
- name: shared
  cluster:
    server: https://second
- name: extra
  cluster:
    server: https://extra
"#,
        );
        let missing = dir.path().join("missing");
        let loader =
            ClientConfigLoader::with_search_paths(&FlagMap::new(), vec![first, missing, second])
                .unwrap();
        let raw = loader.raw_config().unwrap();
        assert_eq!(raw.current_context, "a");
        assert_eq!(raw.cluster("shared").unwrap().server, "https://first");
        assert_eq!(raw.cluster_names(), vec!["shared", "extra"]);
    }

    #[test]
    fn test_explicit_kubeconfig_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let loader = ClientConfigLoader::with_search_paths(
            &flags(&[("kubeconfig", missing.to_str().unwrap())]),
            vec![],
        )
        .unwrap();
        assert!(matches!(loader.raw_config(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_flags_are_skipped() {
        let o = KubeOverrides::from_flag_map(&flags(&[("bogus", "x"), ("user", "me")])).unwrap();
        assert_eq!(o.user.as_deref(), Some("me"));
    }

    #[test]
    fn test_bad_flag_values_are_user_errors() {
        let err = KubeOverrides::from_flag_map(&flags(&[("insecure-skip-tls-verify", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("--insecure-skip-tls-verify=maybe"));

        assert!(KubeOverrides::from_flag_map(&flags(&[("request-timeout", "soon")])).is_err());
    }

    #[test]
    fn test_list_flags_are_csv_decoded() {
        let o = KubeOverrides::from_flag_map(&flags(&[("as-group", "devs,\"a,b\"")])).unwrap();
        assert_eq!(o.impersonate_groups, vec!["devs", "a,b"]);
    }

    #[test]
    fn test_parse_request_timeout() {
        assert_eq!(parse_request_timeout("0").unwrap(), None);
        assert_eq!(parse_request_timeout("15").unwrap(), Some(Duration::from_secs(15)));
        assert_eq!(parse_request_timeout("1m").unwrap(), Some(Duration::from_secs(60)));
        assert!(parse_request_timeout("later").is_err());
    }

    #[test]
    fn test_search_paths() {
        let home = Path::new("/home/me");
        assert_eq!(
            search_paths(None, Some(home)),
            vec![PathBuf::from("/home/me/.kube/config")]
        );
        let joined = std::env::join_paths(["/a", "/b"]).unwrap();
        assert_eq!(
            search_paths(Some(&joined), Some(home)),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        let raw = RawKubeconfig::parse("   \n").unwrap();
        assert!(raw.contexts.is_empty());
    }
}
