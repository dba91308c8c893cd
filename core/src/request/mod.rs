//! The connect request: everything the daemons need to know to establish a
//! session, captured once from flags and environment.

mod args;
mod completion;

pub use args::{ConnectArgs, GlobalFlags, NetworkArgs};
pub use completion::{
    complete_clusters, complete_namespaces, filter_candidates, request_from_line, CompletionError,
};

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Identifier, Subnet};
use crate::error::{Error, Result};
use crate::kubernetes::{ClientConfigLoader, FlagMap, RawKubeconfig, CONTEXT_FLAG};
use crate::ports::{Environment, NamespaceLister};

/// Environment variables forwarded to the daemons because they change how
/// the kubeconfig is read or authenticated.
pub const FORWARDED_ENV: &[&str] = &["KUBECONFIG", "GOOGLE_APPLICATION_CREDENTIALS"];

/// Command whose namespace flag names what to list rather than where to
/// connect.
const LIST_COMMAND: &str = "list";

/// Parameters of a connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// Session name, empty to derive one from context and namespace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapped_namespaces: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_proxy: Vec<Subnet>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub never_proxy: Vec<Subnet>,

    /// Explicit manager namespace, empty when not given.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manager_namespace: String,

    /// kubectl flags that were set on the command line.
    #[serde(default)]
    pub kube_flags: FlagMap,

    /// Environment changes to replay in the daemon. A key prefixed with `-`
    /// means the variable must be unset.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// The daemon runs inside a cluster pod and uses the service account.
    #[serde(default)]
    pub is_pod_daemon: bool,

    #[serde(default)]
    pub docker: bool,

    /// Selects a daemon container by name.
    #[serde(default, rename = "use", with = "regex_serde", skip_serializing_if = "Option::is_none")]
    pub use_regex: Option<Regex>,

    /// Created on behalf of a command other than `connect`.
    #[serde(default)]
    pub implicit: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userd_profiling_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rootd_profiling_port: Option<u16>,
}

impl ConnectRequest {
    /// Builds a request from parsed `connect` flags.
    pub fn commit(args: &ConnectArgs, globals: &GlobalFlags, env: &impl Environment) -> Result<Self> {
        let network = &args.network;
        let mut request = Self {
            name: network.name.clone().unwrap_or_default(),
            mapped_namespaces: network.mapped_namespaces.clone(),
            also_proxy: network.also_proxy.clone(),
            never_proxy: network.never_proxy.clone(),
            manager_namespace: network.manager_namespace.clone().unwrap_or_default(),
            kube_flags: args.kube_flags.clone(),
            environment: capture_environment(env),
            userd_profiling_port: non_zero(network.userd_profiling_port),
            rootd_profiling_port: non_zero(network.rootd_profiling_port),
            ..Default::default()
        };
        request.apply_globals(globals)?;
        debug!(kube_flags = ?request.kube_flags, "committed connect request");
        Ok(request)
    }

    /// Builds the request used when a command needs a session but the user
    /// never ran `connect`.
    ///
    /// `namespace` is honored for every command except `list`, where it
    /// names the namespace to list.
    pub fn implicit(
        command_name: &str,
        namespace: Option<&str>,
        globals: &GlobalFlags,
        env: &impl Environment,
    ) -> Result<Self> {
        let mut request = Self {
            implicit: true,
            environment: capture_environment(env),
            ..Default::default()
        };
        if command_name != LIST_COMMAND {
            if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
                request.kube_flags.insert("namespace".to_string(), ns.to_string());
            }
        }
        request.apply_globals(globals)?;
        Ok(request)
    }

    /// Copies the global flags into the request.
    pub fn apply_globals(&mut self, globals: &GlobalFlags) -> Result<()> {
        if let Some(context) = &globals.context {
            self.kube_flags.insert(CONTEXT_FLAG.to_string(), context.clone());
        }
        if globals.docker {
            self.docker = true;
        }
        if let Some(pattern) = &globals.use_pattern {
            let regex = Regex::new(pattern).map_err(|e| {
                Error::InvalidConfig(format!("unable to parse --use pattern {:?}: {}", pattern, e))
            })?;
            self.use_regex = Some(regex);
        }
        Ok(())
    }

    /// Whether a daemon container name is selected by `--use`.
    pub fn matches_use(&self, container_name: &str) -> bool {
        self.use_regex
            .as_ref()
            .map_or(true, |re| re.is_match(container_name))
    }

    /// Identifier of the session this request would create.
    pub fn identifier(&self, env: &impl Environment) -> Result<Identifier> {
        let loader = ClientConfigLoader::from_environment(&self.kube_flags, env)?;
        Identifier::from_loader(&self.name, &loader)
    }

    /// Lists all namespaces of the cluster the request points at.
    pub async fn get_all_namespaces(&self, lister: &impl NamespaceLister) -> Result<Vec<String>> {
        lister
            .list_namespaces(&self.kube_flags)
            .await
            .map_err(|e| Error::NoDaemonLogs(format!("unable to list namespaces: {}", e)))
    }

    /// Reads the kubeconfig the request points at.
    pub fn get_config(&self, env: &impl Environment) -> Result<RawKubeconfig> {
        let mut flags = FlagMap::new();
        if let Some(path) = self.kube_flags.get("kubeconfig") {
            flags.insert("kubeconfig".to_string(), path.clone());
        }
        ClientConfigLoader::from_environment(&flags, env)
            .and_then(|loader| loader.raw_config())
            .map_err(|e| Error::NoDaemonLogs(format!("unable to read kubeconfig: {}", e)))
    }
}

/// Captures the forwarded variables. A variable that is not set is
/// recorded as `-KEY` so the daemon unsets it too.
pub fn capture_environment(env: &impl Environment) -> BTreeMap<String, String> {
    FORWARDED_ENV
        .iter()
        .map(|key| match env.var(key) {
            Some(value) => (key.to_string(), value),
            None => (format!("-{}", key), String::new()),
        })
        .collect()
}

fn non_zero(port: u16) -> Option<u16> {
    (port != 0).then_some(port)
}

mod regex_serde {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(regex: &Option<Regex>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match regex {
            Some(re) => serializer.serialize_str(re.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(pattern) => Regex::new(&pattern).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MapEnvironment;
    use crate::error::Category;
    use std::sync::Arc;
    use parking_lot::Mutex;

    fn env_with_kubeconfig(path: &str) -> MapEnvironment {
        let mut env = MapEnvironment::default();
        env.set_var("KUBECONFIG", path);
        env
    }

    #[test]
    fn test_capture_environment_marks_unset() {
        let env = env_with_kubeconfig("/tmp/kc");
        let captured = capture_environment(&env);
        assert_eq!(captured.get("KUBECONFIG").unwrap(), "/tmp/kc");
        assert_eq!(captured.get("-GOOGLE_APPLICATION_CREDENTIALS").unwrap(), "");
        assert!(!captured.contains_key("GOOGLE_APPLICATION_CREDENTIALS"));
    }

    #[test]
    fn test_commit_copies_flags() {
        let mut args = ConnectArgs::default();
        args.network.name = Some("dev".into());
        args.network.manager_namespace = Some("infra".into());
        args.network.rootd_profiling_port = 6060;
        args.kube_flags.insert("namespace".into(), "apps".into());
        let globals = GlobalFlags {
            context: Some("kind".into()),
            docker: true,
            use_pattern: Some("^tp-".into()),
        };

        let request = ConnectRequest::commit(&args, &globals, &MapEnvironment::default()).unwrap();
        assert_eq!(request.name, "dev");
        assert_eq!(request.manager_namespace, "infra");
        assert_eq!(request.rootd_profiling_port, Some(6060));
        assert_eq!(request.userd_profiling_port, None);
        assert_eq!(request.kube_flags.get("namespace").unwrap(), "apps");
        assert_eq!(request.kube_flags.get(CONTEXT_FLAG).unwrap(), "kind");
        assert!(request.docker);
        assert!(!request.implicit);
        assert!(request.matches_use("tp-kind-apps"));
        assert!(!request.matches_use("other"));
        assert_eq!(request.environment.len(), 2);
    }

    #[test]
    fn test_bad_use_pattern_is_user_error() {
        let globals = GlobalFlags {
            use_pattern: Some("(".into()),
            ..Default::default()
        };
        let err = ConnectRequest::commit(&ConnectArgs::default(), &globals, &MapEnvironment::default())
            .unwrap_err();
        assert_eq!(err.category(), Category::User);
    }

    #[test]
    fn test_implicit_request_namespace() {
        let env = MapEnvironment::default();
        let globals = GlobalFlags::default();

        let request = ConnectRequest::implicit("status", Some("apps"), &globals, &env).unwrap();
        assert!(request.implicit);
        assert_eq!(request.kube_flags.get("namespace").unwrap(), "apps");

        let request = ConnectRequest::implicit("list", Some("apps"), &globals, &env).unwrap();
        assert!(!request.kube_flags.contains_key("namespace"));
    }

    #[test]
    fn test_serde_keeps_use_pattern() {
        let globals = GlobalFlags {
            use_pattern: Some("kind-.*".into()),
            ..Default::default()
        };
        let request = ConnectRequest::implicit("status", None, &globals, &MapEnvironment::default()).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["use"], "kind-.*");
        assert_eq!(json["implicit"], true);

        let back: ConnectRequest = serde_json::from_value(json).unwrap();
        assert!(back.matches_use("kind-default"));
    }

    #[test]
    fn test_identifier_from_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(
            &path,
            r#"
apiVersion: v1
kind: Config
current-context: kind
clusters:
- name: kind
  cluster:
    server: https://127.0.0.1:6443
contexts:
- name: kind
  context:
    cluster: kind
    user: admin
    namespace: apps
users:
- name: admin
  user:
    token: abc
"#,
        )
        .unwrap();
        let env = env_with_kubeconfig(path.to_str().unwrap());

        let request = ConnectRequest::default();
        let id = request.identifier(&env).unwrap();
        assert_eq!(id.name, "kind-apps");

        let config = request.get_config(&env).unwrap();
        assert_eq!(config.cluster_names(), vec!["kind"]);
    }

    #[test]
    fn test_get_config_missing_file_is_no_daemon_logs() {
        let mut request = ConnectRequest::default();
        request
            .kube_flags
            .insert("kubeconfig".into(), "/nonexistent/telepath/config".into());
        let err = request.get_config(&MapEnvironment::default()).unwrap_err();
        assert_eq!(err.category(), Category::NoDaemonLogs);
    }

    struct FailingLister {
        calls: Arc<Mutex<Vec<FlagMap>>>,
    }

    impl NamespaceLister for FailingLister {
        async fn list_namespaces(&self, kube_flags: &FlagMap) -> Result<Vec<String>> {
            self.calls.lock().push(kube_flags.clone());
            Err(Error::Io(std::io::Error::other("connection refused")))
        }
    }

    #[tokio::test]
    async fn test_get_all_namespaces_error_hides_daemon_logs() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let lister = FailingLister { calls: calls.clone() };
        let mut request = ConnectRequest::default();
        request.kube_flags.insert("namespace".into(), "apps".into());

        let err = request.get_all_namespaces(&lister).await.unwrap_err();
        assert!(!err.shows_daemon_logs());
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(calls.lock()[0].get("namespace").unwrap(), "apps");
    }
}
