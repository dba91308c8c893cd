//! Quit command - end the session and stop both daemons.

use anyhow::Result;
use telepath_core::{ConfigStore, Env};
use tokio_util::sync::CancellationToken;

pub async fn run(json: bool, cancel: CancellationToken) -> Result<()> {
    let config = ConfigStore::new()?.load().await?;
    let env = Env::from_env();
    let manager = super::root_daemon_manager(&config)?;
    let report = manager
        .disconnect(&super::user_daemon(&config, &env), true, &cancel)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(warning) = &report.warning {
        eprintln!("warning: {}", warning);
    }
    if report.user_daemon_disconnected || report.root_daemon_stopped {
        println!("Telepath daemons have quit");
    } else {
        println!("Telepath daemons were not running");
    }
    Ok(())
}
