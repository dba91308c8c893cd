//! Foreground root daemon.
//!
//! Serves the control socket until it is told to quit or interrupted.

use std::path::Path;

use anyhow::Result;
use telepath_core::adapters::ControlServer;
use telepath_core::ConfigStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(pprof: Option<u16>, config_dir: &Path, cancel: CancellationToken) -> Result<()> {
    let config = ConfigStore::with_path(config_dir.join("config.json"))
        .load()
        .await?;
    if let Some(port) = pprof {
        warn!(port, "profiling server is not available in this build");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "root daemon starting");
    let server = ControlServer::bind(&config.daemon.root_socket, env!("CARGO_PKG_VERSION"))?;
    server.serve(cancel).await?;
    info!("root daemon exited");
    Ok(())
}
