//! Log setup for the CLI and the foreground daemon.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use telepath_core::config::LOG_ENV;
use telepath_core::filelocation::DAEMON_LOG;
use tracing_subscriber::EnvFilter;

const DEFAULT_CLI_FILTER: &str = "warn";
const DEFAULT_DAEMON_FILTER: &str = "info";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Logs to stderr so that stdout stays machine readable.
pub fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(filter(DEFAULT_CLI_FILTER))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Appends to the daemon log in `log_dir`.
pub fn init_file(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(DAEMON_LOG))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter(DEFAULT_DAEMON_FILTER))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
