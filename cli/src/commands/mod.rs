//! CLI subcommands.

pub mod complete;
pub mod config;
pub mod list;

#[cfg(unix)]
pub mod connect;
#[cfg(unix)]
pub mod daemon;
#[cfg(unix)]
pub mod quit;
#[cfg(unix)]
pub mod status;

#[cfg(unix)]
use telepath_core::adapters::{PlatformLauncher, SocketUserDaemon, UnixSocketProbe};
#[cfg(unix)]
use telepath_core::{AppDirs, ClientConfig, Env, RootDaemonManager};

/// Manager for the root daemon of the current user.
#[cfg(unix)]
pub fn root_daemon_manager(
    config: &ClientConfig,
) -> anyhow::Result<RootDaemonManager<UnixSocketProbe, PlatformLauncher>> {
    Ok(RootDaemonManager::new(
        UnixSocketProbe::default(),
        PlatformLauncher::new(),
        config,
        AppDirs::new()?,
        std::env::current_exe()?,
    ))
}

/// The local user daemon. It counts as remote when an address is configured.
#[cfg(unix)]
pub fn user_daemon(config: &ClientConfig, env: &Env) -> SocketUserDaemon {
    SocketUserDaemon::new(&config.daemon.user_socket).remote(!env.user_daemon_address.is_empty())
}
