//! Status command - show daemons, session and cluster.

use anyhow::Result;
use serde::Serialize;
use telepath_core::adapters::{ProcessEnvironment, UnixSocketProbe};
use telepath_core::ports::SocketProbe;
use telepath_core::{ConfigStore, ConnectRequest, DaemonState, Env, GlobalFlags, Kubeconfig};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    root_daemon: String,
    user_daemon: String,
    session: Option<String>,
    context: Option<String>,
    server: Option<String>,
    manager_namespace: Option<String>,
    error: Option<String>,
}

pub async fn run(globals: &GlobalFlags, json: bool) -> Result<()> {
    let config = ConfigStore::new()?.load().await?;
    let env = Env::from_env();
    let manager = super::root_daemon_manager(&config)?;

    let root_state = manager.state().await?;
    let user_state = if UnixSocketProbe::new("user daemon")
        .exists(&config.daemon.user_socket)
        .await?
    {
        DaemonState::Running
    } else {
        DaemonState::NotRunning
    };

    let mut view = StatusView {
        root_daemon: root_state.to_string(),
        user_daemon: user_state.to_string(),
        session: None,
        context: None,
        server: None,
        manager_namespace: None,
        error: None,
    };

    // Cluster details are informational; a broken kubeconfig must not hide
    // the daemon state.
    let request = ConnectRequest::implicit("status", None, globals, &ProcessEnvironment)?;
    match Kubeconfig::load(&request.kube_flags, "", &env, &config)
        .and_then(|kc| Ok((request.identifier(&ProcessEnvironment)?, kc)))
    {
        Ok((identifier, kubeconfig)) => {
            view.session = Some(identifier.name);
            view.manager_namespace = Some(kubeconfig.manager_namespace().to_string());
            view.context = Some(kubeconfig.context);
            view.server = Some(kubeconfig.server);
        }
        Err(e) => view.error = Some(e.to_string()),
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Root daemon:       {}", view.root_daemon);
    println!("User daemon:       {}", view.user_daemon);
    if let Some(session) = &view.session {
        println!("Session:           {}", session);
    }
    if let (Some(context), Some(server)) = (&view.context, &view.server) {
        println!("Context:           {} ({})", context, server);
    }
    if let Some(ns) = &view.manager_namespace {
        println!("Manager namespace: {}", ns);
    }
    if let Some(error) = &view.error {
        println!("Kubeconfig:        {}", error);
    }
    Ok(())
}
