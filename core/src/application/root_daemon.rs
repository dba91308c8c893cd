//! Root daemon lifecycle: launch with elevation, readiness, shutdown.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::launch_lock::LaunchLock;
use super::wait::{wait_until_running, wait_until_vanishes};
use crate::config::{ClientConfig, Env};
use crate::domain::{DaemonState, EnsureOutcome, SkipReason};
use crate::error::{Error, Result};
use crate::filelocation::{AppDirs, DAEMON_LOG};
use crate::ports::{ElevatedLauncher, SocketProbe, UserDaemon};
use crate::request::ConnectRequest;

const ROOT_DAEMON: &str = "root daemon";
const LOCK_FILE: &str = "root-daemon.lock";

/// What happened during a disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectReport {
    /// The user daemon was running and acknowledged the disconnect.
    pub user_daemon_disconnected: bool,
    /// The root daemon socket is gone.
    pub root_daemon_stopped: bool,
    /// Set when the root daemon could not be stopped.
    pub warning: Option<String>,
}

/// Starts and stops the root daemon.
///
/// The manager never holds on to the daemon process. The control socket is
/// the only source of truth, which makes every operation safe to repeat and
/// to run from several CLI processes at once.
pub struct RootDaemonManager<P: SocketProbe, L: ElevatedLauncher> {
    probe: P,
    launcher: L,
    dirs: AppDirs,
    executable: PathBuf,
    work_dir: Option<PathBuf>,
    socket_path: PathBuf,
    startup_timeout: Duration,
    quit_timeout: Duration,
}

impl<P: SocketProbe, L: ElevatedLauncher> RootDaemonManager<P, L> {
    /// Create a manager that launches `executable` as the root daemon.
    pub fn new(
        probe: P,
        launcher: L,
        config: &ClientConfig,
        dirs: AppDirs,
        executable: PathBuf,
    ) -> Self {
        Self {
            probe,
            launcher,
            dirs,
            executable,
            work_dir: None,
            socket_path: config.daemon.root_socket.clone(),
            startup_timeout: config.timeouts.root_daemon_startup,
            quit_timeout: config.timeouts.root_daemon_quit,
        }
    }

    /// Launches the daemon in `dir` instead of the current directory.
    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = Some(dir);
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Current state as seen through the socket.
    pub async fn state(&self) -> Result<DaemonState> {
        Ok(if self.probe.exists(&self.socket_path).await? {
            DaemonState::Running
        } else {
            DaemonState::NotRunning
        })
    }

    /// Makes sure the root daemon is running, launching it if needed.
    pub async fn ensure_running<U: UserDaemon>(
        &self,
        request: &ConnectRequest,
        user_daemon: &U,
        env: &Env,
        cancel: &CancellationToken,
    ) -> Result<EnsureOutcome> {
        if let Some(reason) = skip_reason(request, user_daemon, env) {
            debug!(?reason, "not managing the root daemon");
            return Ok(EnsureOutcome::Skipped(reason));
        }

        if self.probe.exists(&self.socket_path).await? {
            debug!(state = %DaemonState::Running, "root daemon already running");
            return Ok(EnsureOutcome::AlreadyRunning);
        }

        self.dirs.ensure_cache_dirs().map_err(|e| {
            e.no_daemon_logs("unable to ensure that the cache directory exists")
        })?;
        let _lock = LaunchLock::acquire(
            &self.dirs.daemons_dir().join(LOCK_FILE),
            self.startup_timeout * 2,
            cancel,
        )
        .await?;

        if self.probe.exists(&self.socket_path).await? {
            info!(state = %DaemonState::Running, "root daemon was started by another process");
            return Ok(EnsureOutcome::StartedElsewhere);
        }

        self.launch(request.rootd_profiling_port).await?;

        info!(state = %DaemonState::AwaitingSocket, socket = %self.socket_path.display(), "waiting for root daemon");
        wait_until_running(
            &self.probe,
            ROOT_DAEMON,
            &self.socket_path,
            self.startup_timeout,
            cancel,
        )
        .await
        .map_err(|e| Error::DaemonStart(Box::new(e)))?;

        info!(state = %DaemonState::Running, "root daemon is ready");
        Ok(EnsureOutcome::Launched)
    }

    /// Arguments of the elevated root daemon command line.
    pub fn daemon_args(&self, profiling_port: Option<u16>) -> Vec<String> {
        let mut args = vec![
            self.executable.to_string_lossy().into_owned(),
            "daemon-foreground".to_string(),
        ];
        if let Some(port) = profiling_port.filter(|p| *p > 0) {
            args.push("--pprof".to_string());
            args.push(port.to_string());
        }
        args.push(self.dirs.log_dir.to_string_lossy().into_owned());
        args.push(self.dirs.config_dir.to_string_lossy().into_owned());
        args
    }

    async fn launch(&self, profiling_port: Option<u16>) -> Result<()> {
        // The log file must exist before elevation so root does not own it.
        self.dirs.ensure_log_file(DAEMON_LOG)?;
        self.dirs.ensure_config_dir().map_err(|e| {
            e.no_daemon_logs("unable to ensure that the config directory exists")
        })?;

        let work_dir = match &self.work_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let args = self.daemon_args(profiling_port);
        info!(state = %DaemonState::Launching, command = ?args, work_dir = %work_dir.display(), "launching root daemon");
        self.launcher.launch_elevated(&args, &work_dir).await
    }

    /// Ends the session and, if `quit_daemons` is set, stops the daemons.
    ///
    /// A missing user daemon is not an error. Failing to stop the root daemon
    /// is reported as a warning.
    pub async fn disconnect<U: UserDaemon>(
        &self,
        user_daemon: &U,
        quit_daemons: bool,
        cancel: &CancellationToken,
    ) -> Result<DisconnectReport> {
        let mut report = DisconnectReport::default();
        match user_daemon.disconnect(quit_daemons).await {
            Ok(()) => report.user_daemon_disconnected = true,
            Err(Error::NoUserDaemon) => debug!("user daemon is not running"),
            Err(e) => return Err(e),
        }

        if quit_daemons {
            match self.quit_root_daemon(cancel).await {
                Ok(()) => report.root_daemon_stopped = true,
                Err(e @ Error::Cancelled(_)) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "root daemon did not stop");
                    report.warning = Some(format!("error when quitting root daemon: {}", e));
                }
            }
        }
        Ok(report)
    }

    /// The user daemon normally stops the root daemon. If it is gone or was
    /// killed, the root daemon is asked directly.
    async fn quit_root_daemon(&self, cancel: &CancellationToken) -> Result<()> {
        debug!(state = %DaemonState::Quitting, "waiting for root daemon to exit");
        let err = match wait_until_vanishes(
            &self.probe,
            ROOT_DAEMON,
            &self.socket_path,
            self.quit_timeout,
            cancel,
        )
        .await
        {
            Ok(()) => {
                info!(state = %DaemonState::Vanished, "root daemon stopped");
                return Ok(());
            }
            Err(e @ Error::Cancelled(_)) => return Err(e),
            Err(e) => e,
        };

        info!(error = %err, "sending quit to root daemon");
        self.probe.quit(&self.socket_path).await?;
        info!(state = %DaemonState::Vanished, "root daemon acknowledged quit");
        Ok(())
    }
}

/// Why the root daemon must be left alone, if it must.
pub fn skip_reason<U: UserDaemon>(
    request: &ConnectRequest,
    user_daemon: &U,
    env: &Env,
) -> Option<SkipReason> {
    if user_daemon.is_remote() {
        Some(SkipReason::RemoteUserDaemon)
    } else if request.docker {
        Some(SkipReason::Docker)
    } else if !env.user_daemon_address.is_empty() {
        Some(SkipReason::UserDaemonAddress)
    } else {
        None
    }
}
