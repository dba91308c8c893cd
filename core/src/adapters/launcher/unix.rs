//! Unix elevation: run directly as root, otherwise through sudo.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use nix::unistd::geteuid;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub struct UnixLauncher;

impl UnixLauncher {
    pub fn new() -> Self {
        Self
    }

    pub async fn launch(&self, args: &[String], work_dir: &Path) -> Result<()> {
        let (program, rest) = split_command(args)?;

        if geteuid().is_root() {
            return spawn_detached(program, rest, work_dir);
        }

        // Ask for the password while the terminal is still attached.
        info!("elevating with sudo to start {}", program);
        let status = tokio::process::Command::new("sudo")
            .arg("--validate")
            .status()
            .await
            .map_err(Error::Launch)?;
        if !status.success() {
            return Err(Error::Launch(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "sudo authentication failed",
            )));
        }

        let mut sudo_args = sudo_arguments();
        sudo_args.push(program.to_string());
        sudo_args.extend(rest.iter().cloned());
        spawn_detached("sudo", &sudo_args, work_dir)
    }
}

fn sudo_arguments() -> Vec<String> {
    vec!["--non-interactive".to_string(), "--preserve-env".to_string()]
}

pub(super) fn split_command(args: &[String]) -> Result<(&str, &[String])> {
    match args.split_first() {
        Some((program, rest)) if !program.is_empty() => Ok((program.as_str(), rest)),
        _ => Err(Error::Launch(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no program to launch",
        ))),
    }
}

/// Starts a process in its own process group with no stdio, so that it
/// outlives the CLI and ignores its Ctrl-C.
fn spawn_detached(program: &str, args: &[String], work_dir: &Path) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let child = Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(Error::Launch)?;
    debug!(pid = child.id(), program, "spawned detached process");
    Ok(())
}
