//! Client configuration and environment.
//!
//! Stores configuration in JSON format at `<config dir>/config.json`. A
//! missing file means defaults; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::adapters::ProcessEnvironment;
use crate::error::{Error, Result};
use crate::filelocation::AppDirs;
use crate::ports::Environment;

/// Environment variable naming the traffic manager namespace.
pub const MANAGER_NAMESPACE_ENV: &str = "TELEPATH_MANAGER_NAMESPACE";

/// Environment variable naming an externally managed user daemon.
pub const USER_DAEMON_ADDRESS_ENV: &str = "TELEPATH_USER_DAEMON_ADDRESS";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "TELEPATH_LOG";

/// Cluster related settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Namespace of the traffic manager when nothing else names one.
    #[serde(default = "default_manager_namespace")]
    pub default_manager_namespace: String,
}

fn default_manager_namespace() -> String {
    "ambassador".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_manager_namespace: default_manager_namespace(),
        }
    }
}

/// Timeouts of the daemon lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    /// How long to wait for the root daemon socket after launch.
    #[serde(default = "default_startup", with = "crate::humantime_serde")]
    pub root_daemon_startup: Duration,

    /// How long to wait for the root daemon socket to vanish on quit.
    #[serde(default = "default_quit", with = "crate::humantime_serde")]
    pub root_daemon_quit: Duration,
}

fn default_startup() -> Duration {
    Duration::from_secs(10)
}

fn default_quit() -> Duration {
    Duration::from_secs(5)
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            root_daemon_startup: default_startup(),
            root_daemon_quit: default_quit(),
        }
    }
}

/// Where the daemons listen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    #[serde(default = "default_root_socket")]
    pub root_socket: PathBuf,

    #[serde(default = "default_user_socket")]
    pub user_socket: PathBuf,
}

fn default_root_socket() -> PathBuf {
    PathBuf::from("/var/run/telepath-daemon.socket")
}

fn default_user_socket() -> PathBuf {
    std::env::temp_dir().join("telepath-connector.socket")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            root_socket: default_root_socket(),
            user_socket: default_user_socket(),
        }
    }
}

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Configuration store for the client configuration file.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store in the user's config directory.
    pub fn new() -> Result<Self> {
        let dirs = AppDirs::new()?;
        Ok(Self {
            config_path: dirs.config_dir.join("config.json"),
        })
    }

    /// Create a config store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Path of the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<ClientConfig> {
        if !self.config_path.exists() {
            return Ok(ClientConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            fs::create_dir_all(config_dir)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}

/// Snapshot of the environment variables the client reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Env {
    pub manager_namespace: String,
    pub user_daemon_address: String,
    pub log_filter: Option<String>,
}

impl Env {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_environment(&ProcessEnvironment)
    }

    pub fn from_environment(env: &impl Environment) -> Self {
        Self {
            manager_namespace: env.var(MANAGER_NAMESPACE_ENV).unwrap_or_default(),
            user_daemon_address: env.var(USER_DAEMON_ADDRESS_ENV).unwrap_or_default(),
            log_filter: env.var(LOG_ENV).filter(|f| !f.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MapEnvironment;
    use tempfile::tempdir;

    fn test_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        (ConfigStore::with_path(path), dir)
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _dir) = test_store();
        let config = store.load().await.unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.cluster.default_manager_namespace, "ambassador");
        assert_eq!(config.timeouts.root_daemon_startup, Duration::from_secs(10));
        assert_eq!(config.timeouts.root_daemon_quit, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _dir) = test_store();

        let mut config = ClientConfig::default();
        config.cluster.default_manager_namespace = "telepath".into();
        config.timeouts.root_daemon_startup = Duration::from_secs(30);
        store.save(&config).await.unwrap();

        let raw = std::fs::read_to_string(store.config_path()).unwrap();
        assert!(raw.contains("\"rootDaemonStartup\": \"30s\""));
        assert!(!store.config_path().with_extension("json.tmp").exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let (store, _dir) = test_store();
        std::fs::create_dir_all(store.config_path().parent().unwrap()).unwrap();
        std::fs::write(
            store.config_path(),
            r#"{"timeouts": {"rootDaemonQuit": "2s"}, "unknown": true}"#,
        )
        .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.timeouts.root_daemon_quit, Duration::from_secs(2));
        assert_eq!(loaded.timeouts.root_daemon_startup, Duration::from_secs(10));
        assert_eq!(loaded.cluster.default_manager_namespace, "ambassador");
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let (store, _dir) = test_store();
        std::fs::create_dir_all(store.config_path().parent().unwrap()).unwrap();
        std::fs::write(store.config_path(), "{not json").unwrap();
        assert!(matches!(store.load().await, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_from_environment() {
        let mut env = MapEnvironment::default();
        env.set_var(MANAGER_NAMESPACE_ENV, "mgr");
        env.set_var(LOG_ENV, "");

        let snapshot = Env::from_environment(&env);
        assert_eq!(snapshot.manager_namespace, "mgr");
        assert!(snapshot.user_daemon_address.is_empty());
        assert_eq!(snapshot.log_filter, None);
    }
}
