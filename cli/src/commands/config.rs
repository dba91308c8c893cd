//! Config command - show or initialize the client configuration.

use anyhow::Result;
use telepath_core::ConfigStore;

pub async fn show() -> Result<()> {
    let store = ConfigStore::new()?;
    let config = store.load().await?;
    eprintln!("# {}", store.config_path().display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub async fn init() -> Result<()> {
    let store = ConfigStore::new()?;
    if store.config_path().exists() {
        println!("Configuration already exists at {}", store.config_path().display());
        return Ok(());
    }
    store.save(&Default::default()).await?;
    println!("Wrote default configuration to {}", store.config_path().display());
    Ok(())
}
