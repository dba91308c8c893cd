//! Telepath CLI - Connect a workstation to a Kubernetes cluster
//!
//! Resolves kubeconfig and connect flags, then starts, reuses or stops
//! the privileged root daemon that carries the session.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use telepath_core::{AppDirs, ConnectArgs, GlobalFlags};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "telepath")]
#[command(author, version, about = "Connect your workstation to a Kubernetes cluster")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    globals: GlobalFlags,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a cluster, starting the root daemon if needed
    Connect(ConnectArgs),

    /// Disconnect and tell the daemons to quit
    Quit,

    /// Show daemon and cluster status
    Status,

    /// List the namespaces of the cluster
    #[command(alias = "ls")]
    List {
        /// Only show namespaces starting with this prefix
        #[arg(short = 'n', long)]
        namespace: Option<String>,
    },

    /// Show or initialize the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run the root daemon in the foreground
    #[command(name = "daemon-foreground", hide = true)]
    DaemonForeground {
        /// Port of the profiling server
        #[arg(long)]
        pprof: Option<u16>,
        log_dir: PathBuf,
        config_dir: PathBuf,
    },

    /// Complete the value of a flag
    #[command(name = "__complete", hide = true)]
    Complete {
        flag: String,
        #[arg(default_value = "")]
        partial: String,
        /// Words typed before the cursor, without the program name
        #[arg(last = true)]
        words: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration if none exists
    Init,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let logs = match &cli.command {
        Commands::DaemonForeground { log_dir, .. } => logging::init_file(log_dir),
        _ => {
            logging::init_stderr();
            Ok(())
        }
    };
    let result = match logs {
        Ok(()) => run(cli.command, &cli.globals, cli.json, cancel).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("telepath: {}", report(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Commands,
    globals: &GlobalFlags,
    json: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    match command {
        #[cfg(unix)]
        Commands::Connect(args) => commands::connect::run(&args, globals, json, cancel).await,
        #[cfg(unix)]
        Commands::Quit => commands::quit::run(json, cancel).await,
        #[cfg(unix)]
        Commands::Status => commands::status::run(globals, json).await,
        #[cfg(unix)]
        Commands::DaemonForeground {
            pprof, config_dir, ..
        } => commands::daemon::run(pprof, &config_dir, cancel).await,
        #[cfg(not(unix))]
        Commands::Connect(_)
        | Commands::Quit
        | Commands::Status
        | Commands::DaemonForeground { .. } => {
            anyhow::bail!("managing the daemons requires a Unix host")
        }
        Commands::List { namespace } => {
            commands::list::run(globals, namespace.as_deref(), json).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show().await,
            ConfigAction::Init => commands::config::init().await,
        },
        Commands::Complete {
            flag,
            partial,
            words,
        } => {
            commands::complete::run(&flag, &partial, &words).await;
            Ok(())
        }
    }
}

/// Formats an error, pointing at the daemon log when the daemons may know more.
fn report(err: &anyhow::Error) -> String {
    let shows_logs = err
        .downcast_ref::<telepath_core::Error>()
        .map_or(false, telepath_core::Error::shows_daemon_logs);
    if !shows_logs {
        return format!("{:#}", err);
    }
    match AppDirs::new() {
        Ok(dirs) => format!(
            "{:#}\nsee {} for details",
            err,
            dirs.log_dir.join(telepath_core::filelocation::DAEMON_LOG).display()
        ),
        Err(_) => format!("{:#}", err),
    }
}
