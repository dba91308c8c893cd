//! Connect command - resolve the cluster and make sure the root daemon runs.

use anyhow::Result;
use serde::Serialize;
use telepath_core::adapters::ProcessEnvironment;
use telepath_core::{
    ConfigStore, ConnectArgs, ConnectRequest, EnsureOutcome, Env, GlobalFlags, Kubeconfig,
    SkipReason,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectView<'a> {
    session: &'a str,
    context: &'a str,
    server: &'a str,
    namespace: &'a str,
    manager_namespace: &'a str,
    root_daemon: &'static str,
}

pub async fn run(
    args: &ConnectArgs,
    globals: &GlobalFlags,
    json: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let config = ConfigStore::new()?.load().await?;
    let env = Env::from_env();
    let request = ConnectRequest::commit(args, globals, &ProcessEnvironment)?;

    let kubeconfig = Kubeconfig::load(&request.kube_flags, &request.manager_namespace, &env, &config)?;
    let identifier = request.identifier(&ProcessEnvironment)?;
    info!(session = %identifier, server = %kubeconfig.server, "resolved connection");

    let manager = super::root_daemon_manager(&config)?;
    let user_daemon = super::user_daemon(&config, &env);
    let outcome = manager
        .ensure_running(&request, &user_daemon, &env, &cancel)
        .await?;

    let view = ConnectView {
        session: &identifier.name,
        context: &kubeconfig.context,
        server: &kubeconfig.server,
        namespace: &kubeconfig.namespace,
        manager_namespace: kubeconfig.manager_namespace(),
        root_daemon: describe(outcome),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Session:           {}", view.session);
    println!("Context:           {} ({})", view.context, view.server);
    println!("Namespace:         {}", view.namespace);
    println!("Manager namespace: {}", view.manager_namespace);
    println!("Root daemon:       {}", view.root_daemon);
    Ok(())
}

fn describe(outcome: EnsureOutcome) -> &'static str {
    match outcome {
        EnsureOutcome::AlreadyRunning => "already running",
        EnsureOutcome::Launched => "started",
        EnsureOutcome::StartedElsewhere => "started by another process",
        EnsureOutcome::Skipped(SkipReason::RemoteUserDaemon) => "managed by the remote user daemon",
        EnsureOutcome::Skipped(SkipReason::Docker) => "runs in a container",
        EnsureOutcome::Skipped(SkipReason::UserDaemonAddress) => "managed by the configured user daemon",
    }
}
