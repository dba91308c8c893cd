//! The resolved cluster configuration of a session.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::extension::{KubeconfigExtension, ManagerConfig, RemoteExtension, EXTENSION_NAME};
use super::flags::FlagMap;
use super::kubeconfig::{ClientConfigLoader, KubeOverrides, RestConfig, DEFAULT_NAMESPACE};
use crate::config::{ClientConfig, Env};
use crate::error::{Error, Result};
use crate::ports::Environment;
use crate::request::ConnectRequest;

/// Directory where a pod finds its service account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Cluster configuration resolved from flags, kubeconfig and environment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kubeconfig {
    /// Name of the selected context. Empty when running in-cluster.
    pub context: String,
    /// API server URL.
    pub server: String,
    /// Default namespace for requests.
    pub namespace: String,
    pub flag_map: FlagMap,
    pub rest_config: RestConfig,
    pub extension: KubeconfigExtension,
}

/// Picks the traffic manager namespace.
///
/// Precedence is the explicit override, then the environment, then the
/// kubeconfig extension, then the configured default.
pub fn resolve_manager_namespace(
    override_ns: &str,
    env_ns: &str,
    extension_ns: &str,
    default_ns: &str,
) -> String {
    [override_ns, env_ns, extension_ns, default_ns]
        .into_iter()
        .find(|ns| !ns.is_empty())
        .unwrap_or_default()
        .to_string()
}

impl Kubeconfig {
    /// Resolves the configuration selected by the loader's flags.
    pub fn resolve(
        loader: &ClientConfigLoader,
        manager_namespace_override: &str,
        env: &Env,
        config: &ClientConfig,
    ) -> Result<Self> {
        let raw = loader.raw_config()?;
        if raw.contexts.is_empty() {
            return Err(Error::Config("kubeconfig has no context definition".into()));
        }

        let namespace = loader.namespace(&raw);
        let context_name = loader.context_name(&raw);
        let context = raw.context(&context_name).ok_or_else(|| {
            Error::Config(format!(
                "context {:?} does not exist in the kubeconfig",
                context_name
            ))
        })?;

        let cluster_name = match &loader.overrides().cluster {
            Some(c) if !c.is_empty() => c.clone(),
            _ => context.cluster.clone(),
        };
        let cluster = raw.cluster(&cluster_name).ok_or_else(|| {
            Error::Config(format!(
                "the cluster {:?} declared in context {:?} does not exist in the kubeconfig",
                cluster_name, context_name
            ))
        })?;

        let rest_config = loader.client_config(&raw)?;
        debug!(namespace = %namespace, context = %context_name, "using namespace");

        let mut extension = match cluster.extensions.iter().find(|e| e.name == EXTENSION_NAME) {
            Some(ext) => serde_yaml::from_value::<KubeconfigExtension>(ext.extension.clone())
                .map_err(|e| {
                    Error::Config(format!(
                        "unable to parse extension {} in kubeconfig: {}",
                        EXTENSION_NAME, e
                    ))
                })?,
            None => KubeconfigExtension::default(),
        };
        extension.manager.namespace = resolve_manager_namespace(
            manager_namespace_override,
            &env.manager_namespace,
            &extension.manager.namespace,
            &config.cluster.default_manager_namespace,
        );

        Ok(Self {
            context: context_name,
            server: rest_config.host.clone(),
            namespace,
            flag_map: loader.flag_map().clone(),
            rest_config,
            extension,
        })
    }

    /// Resolves the configuration for a flag map using the process environment.
    pub fn load(
        flag_map: &FlagMap,
        manager_namespace_override: &str,
        env: &Env,
        config: &ClientConfig,
    ) -> Result<Self> {
        let loader = ClientConfigLoader::new(flag_map)?;
        Self::resolve(&loader, manager_namespace_override, env, config)
    }

    /// Configuration for a daemon running inside a pod.
    pub fn in_cluster(
        flag_map: &FlagMap,
        environment: &impl Environment,
        service_account_dir: &Path,
        config: &ClientConfig,
    ) -> Result<Self> {
        let overrides = KubeOverrides::from_flag_map(flag_map)?;

        let host = match &overrides.server {
            Some(server) => server.clone(),
            None => {
                let (Some(host), Some(port)) = (
                    environment.var("KUBERNETES_SERVICE_HOST").filter(|h| !h.is_empty()),
                    environment.var("KUBERNETES_SERVICE_PORT").filter(|p| !p.is_empty()),
                ) else {
                    return Err(Error::Config(
                        "unable to load in-cluster configuration, KUBERNETES_SERVICE_HOST and \
                         KUBERNETES_SERVICE_PORT must be defined"
                            .into(),
                    ));
                };
                if host.contains(':') {
                    format!("https://[{}]:{}", host, port)
                } else {
                    format!("https://{}:{}", host, port)
                }
            }
        };

        let namespace = match overrides.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            Some(ns) => ns.to_string(),
            None => std::fs::read_to_string(service_account_dir.join("namespace"))
                .ok()
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        };

        let env = Env::from_environment(environment);
        let manager_namespace = resolve_manager_namespace(
            "",
            &env.manager_namespace,
            "",
            &config.cluster.default_manager_namespace,
        );

        let rest_config = RestConfig {
            host: host.clone(),
            tls_server_name: overrides.tls_server_name,
            insecure: overrides.insecure_skip_tls_verify,
            ca_file: Some(
                overrides
                    .certificate_authority
                    .unwrap_or_else(|| service_account_dir.join("ca.crt")),
            ),
            bearer_token: overrides.token,
            bearer_token_file: Some(service_account_dir.join("token")),
            impersonate: overrides.impersonate,
            impersonate_groups: overrides.impersonate_groups,
            impersonate_uid: overrides.impersonate_uid,
            disable_compression: overrides.disable_compression,
            ..Default::default()
        };

        Ok(Self {
            context: String::new(),
            server: host,
            namespace,
            flag_map: flag_map.clone(),
            rest_config,
            extension: KubeconfigExtension {
                manager: ManagerConfig {
                    namespace: manager_namespace,
                },
                ..Default::default()
            },
        })
    }

    /// Whether two configurations share context, server and flags, which is
    /// what decides if an existing session can be reused.
    pub fn context_server_and_flags_equal(&self, other: &Kubeconfig) -> bool {
        self.context == other.context
            && self.server == other.server
            && self.flag_map == other.flag_map
    }

    pub fn manager_namespace(&self) -> &str {
        &self.extension.manager.namespace
    }

    /// Applies the DNS and routing override sent by the traffic manager.
    pub fn add_remote_extension(&mut self, yaml: &str) -> Result<()> {
        debug!(config = %yaml, "applying remote dns and routing");
        let remote: RemoteExtension = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("unable to parse remote kubeconfig: {}", e)))?;
        self.extension.merge_remote(remote);
        Ok(())
    }
}

/// Resolves the configuration a daemon uses for a connect request.
///
/// The environment captured by the CLI is replayed into `environment` first:
/// a key starting with `-` removes the variable, other keys set it.
pub fn daemon_kubeconfig(
    request: &ConnectRequest,
    environment: &mut impl Environment,
    config: &ClientConfig,
) -> Result<Kubeconfig> {
    if request.is_pod_daemon {
        return Kubeconfig::in_cluster(
            &request.kube_flags,
            environment,
            &PathBuf::from(SERVICE_ACCOUNT_DIR),
            config,
        );
    }

    for (key, value) in &request.environment {
        match key.strip_prefix('-') {
            Some(unset) => environment.remove_var(unset),
            None => environment.set_var(key, value),
        }
    }

    let loader = ClientConfigLoader::from_environment(&request.kube_flags, environment)?;
    let env = Env::from_environment(environment);
    Kubeconfig::resolve(&loader, &request.manager_namespace, &env, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MapEnvironment;
    use std::time::Duration;
    use tempfile::tempdir;

    const KUBECONFIG: &str = r#"
current-context: dev
clusters:
- name: dev-cluster
  cluster:
    server: https://dev.example.com:6443
    extensions:
    - name: telepath.io
      extension:
        dns:
          local-ip: 10.0.0.53
          exclude-suffixes: [".local"]
        also-proxy: ["10.10.0.0/16"]
        manager:
          namespace: from-extension
- name: bare-cluster
  cluster:
    server: https://bare.example.com
- name: broken-cluster
  cluster:
    server: https://broken.example.com
    extensions:
    - name: telepath.io
      extension:
        also-proxy: "not a list"
contexts:
- name: dev
  context:
    cluster: dev-cluster
    namespace: apps
- name: bare
  context:
    cluster: bare-cluster
- name: broken
  context:
    cluster: broken-cluster
- name: orphan
  context:
    cluster: missing-cluster
"#;

    fn loader(dir: &Path, flags: &[(&str, &str)]) -> ClientConfigLoader {
        let path = dir.join("config");
        std::fs::write(&path, KUBECONFIG).unwrap();
        let map: FlagMap = flags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfigLoader::with_search_paths(&map, vec![path]).unwrap()
    }

    fn resolve(flags: &[(&str, &str)], override_ns: &str) -> Result<Kubeconfig> {
        let dir = tempdir().unwrap();
        Kubeconfig::resolve(
            &loader(dir.path(), flags),
            override_ns,
            &Env::default(),
            &ClientConfig::default(),
        )
    }

    #[test]
    fn test_resolve_reads_extension() {
        let kc = resolve(&[], "").unwrap();
        assert_eq!(kc.context, "dev");
        assert_eq!(kc.server, "https://dev.example.com:6443");
        assert_eq!(kc.namespace, "apps");
        assert_eq!(kc.manager_namespace(), "from-extension");
        assert_eq!(kc.extension.also_proxy.len(), 1);
        assert_eq!(
            kc.extension.dns.as_ref().unwrap().local_ip,
            Some("10.0.0.53".parse().unwrap())
        );
    }

    #[test]
    fn test_resolve_errors_are_config() {
        let missing = resolve(&[("context", "nope")], "").unwrap_err();
        assert!(matches!(missing, Error::Config(_)));
        assert!(missing.to_string().contains("\"nope\""));

        let orphan = resolve(&[("context", "orphan")], "").unwrap_err();
        assert!(orphan.to_string().contains("missing-cluster"));

        let broken = resolve(&[("context", "broken")], "").unwrap_err();
        assert!(broken.to_string().contains("unable to parse extension telepath.io"));
    }

    #[test]
    fn test_no_contexts_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "clusters: []\n").unwrap();
        let loader = ClientConfigLoader::with_search_paths(&FlagMap::new(), vec![path]).unwrap();
        let err = Kubeconfig::resolve(&loader, "", &Env::default(), &ClientConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cluster_and_server_flags() {
        let kc = resolve(&[("cluster", "bare-cluster")], "").unwrap();
        assert_eq!(kc.server, "https://bare.example.com");
        assert!(kc.extension.dns.is_none());

        let kc = resolve(&[("server", "https://override:8443")], "").unwrap();
        assert_eq!(kc.server, "https://override:8443");
    }

    #[test]
    fn test_manager_namespace_precedence() {
        let cases = [
            ("override", "env", "ext", "default", "override"),
            ("", "env", "ext", "default", "env"),
            ("", "", "ext", "default", "ext"),
            ("", "", "", "default", "default"),
            ("", "", "", "", ""),
        ];
        for (o, e, x, d, expected) in cases {
            assert_eq!(resolve_manager_namespace(o, e, x, d), expected);
        }
    }

    #[test]
    fn test_manager_namespace_default_from_config() {
        let kc = resolve(&[("context", "bare")], "").unwrap();
        assert_eq!(kc.manager_namespace(), "ambassador");

        let kc = resolve(&[("context", "bare")], "explicit").unwrap();
        assert_eq!(kc.manager_namespace(), "explicit");
    }

    #[test]
    fn test_remote_extension_fill_only_and_append() {
        let mut kc = resolve(&[], "").unwrap();
        let remote = r#"
dns:
  localIP: 192.168.1.1
  remoteIP: 10.96.0.10
  excludeSuffixes: [".local"]
  lookupTimeout: 3s
routing:
  neverProxy: ["10.20.0.0/16"]
  alsoProxy: ["10.10.0.0/16"]
"#;
        kc.add_remote_extension(remote).unwrap();
        let dns = kc.extension.dns.clone().unwrap();
        assert_eq!(dns.local_ip, Some("10.0.0.53".parse().unwrap()));
        assert_eq!(dns.remote_ip, Some("10.96.0.10".parse().unwrap()));
        assert_eq!(dns.exclude_suffixes, vec![".local", ".local"]);
        assert_eq!(dns.lookup_timeout, Some(Duration::from_secs(3)));
        assert_eq!(kc.extension.also_proxy.len(), 2);

        kc.add_remote_extension(remote).unwrap();
        let again = kc.extension.dns.clone().unwrap();
        assert_eq!(again.local_ip, dns.local_ip);
        assert_eq!(again.remote_ip, dns.remote_ip);
        assert_eq!(again.lookup_timeout, dns.lookup_timeout);
        assert_eq!(again.exclude_suffixes.len(), 3);
        assert_eq!(kc.extension.never_proxy.len(), 2);
    }

    #[test]
    fn test_remote_extension_parse_error() {
        let mut kc = resolve(&[], "").unwrap();
        let err = kc.add_remote_extension("dns: [unclosed").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_remote_extension_creates_dns() {
        let mut kc = resolve(&[("context", "bare")], "").unwrap();
        kc.add_remote_extension("routing: {}\n").unwrap();
        assert_eq!(kc.extension.dns, Some(Default::default()));
    }

    #[test]
    fn test_context_server_and_flags_equal() {
        let a = resolve(&[], "").unwrap();
        let b = resolve(&[], "other").unwrap();
        assert!(a.context_server_and_flags_equal(&b));

        let c = resolve(&[("namespace", "apps")], "").unwrap();
        assert!(!a.context_server_and_flags_equal(&c));
    }

    #[test]
    fn test_in_cluster() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("namespace"), "pods\n").unwrap();
        let mut env = MapEnvironment::default();
        env.set_var("KUBERNETES_SERVICE_HOST", "10.96.0.1");
        env.set_var("KUBERNETES_SERVICE_PORT", "443");
        env.set_var("TELEPATH_MANAGER_NAMESPACE", "mgr");

        let kc = Kubeconfig::in_cluster(&FlagMap::new(), &env, dir.path(), &ClientConfig::default())
            .unwrap();
        assert_eq!(kc.server, "https://10.96.0.1:443");
        assert_eq!(kc.namespace, "pods");
        assert_eq!(kc.manager_namespace(), "mgr");
        assert_eq!(kc.rest_config.bearer_token_file, Some(dir.path().join("token")));
    }

    #[test]
    fn test_in_cluster_requires_service_env() {
        let dir = tempdir().unwrap();
        let env = MapEnvironment::default();
        let err = Kubeconfig::in_cluster(&FlagMap::new(), &env, dir.path(), &ClientConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_daemon_kubeconfig_replays_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kc");
        std::fs::write(&path, KUBECONFIG).unwrap();

        let mut request = ConnectRequest::default();
        request
            .environment
            .insert("KUBECONFIG".into(), path.to_string_lossy().into_owned());
        request
            .environment
            .insert("-GOOGLE_APPLICATION_CREDENTIALS".into(), String::new());
        request.manager_namespace = "requested".into();

        let mut env = MapEnvironment::default();
        env.set_var("GOOGLE_APPLICATION_CREDENTIALS", "/creds.json");

        let kc = daemon_kubeconfig(&request, &mut env, &ClientConfig::default()).unwrap();
        assert_eq!(kc.context, "dev");
        assert_eq!(kc.manager_namespace(), "requested");
        assert_eq!(env.var("GOOGLE_APPLICATION_CREDENTIALS"), None);
        assert_eq!(env.var("KUBECONFIG"), Some(path.to_string_lossy().into_owned()));
    }
}
