//! List command - show the namespaces of the cluster.

use anyhow::Result;
use telepath_core::adapters::ProcessEnvironment;
use telepath_core::kubernetes::KubectlDiscovery;
use telepath_core::request::filter_candidates;
use telepath_core::{ConnectRequest, GlobalFlags};

pub async fn run(globals: &GlobalFlags, prefix: Option<&str>, json: bool) -> Result<()> {
    let request = ConnectRequest::implicit("list", prefix, globals, &ProcessEnvironment)?;
    let namespaces = request.get_all_namespaces(&KubectlDiscovery::new()).await?;
    let namespaces = filter_candidates(namespaces, prefix.unwrap_or_default());

    if json {
        println!("{}", serde_json::to_string_pretty(&namespaces)?);
        return Ok(());
    }

    if namespaces.is_empty() {
        println!("No namespaces found.");
        return Ok(());
    }

    println!("NAMESPACE");
    println!("{}", "-".repeat(40));
    for ns in &namespaces {
        println!("{}", ns);
    }
    println!("\nTotal: {} namespaces", namespaces.len());
    Ok(())
}
