//! Windows elevation through an elevated PowerShell `Start-Process`.

use std::io;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};

pub struct WindowsLauncher;

impl WindowsLauncher {
    pub fn new() -> Self {
        Self
    }

    pub async fn launch(&self, args: &[String], work_dir: &Path) -> Result<()> {
        let Some((program, rest)) = args.split_first() else {
            return Err(Error::Launch(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no program to launch",
            )));
        };

        let script = start_process_script(program, rest, work_dir);
        info!("elevating with RunAs to start {}", program);
        let status = tokio::process::Command::new("powershell.exe")
            .args(["-NoProfile", "-NonInteractive", "-Command", &script])
            .status()
            .await
            .map_err(Error::Launch)?;
        if !status.success() {
            return Err(Error::Launch(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("elevated start of {} failed", program),
            )));
        }
        Ok(())
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn start_process_script(program: &str, args: &[String], work_dir: &Path) -> String {
    let mut script = format!(
        "Start-Process -FilePath {} -Verb RunAs -WindowStyle Hidden -WorkingDirectory {}",
        quote(program),
        quote(&work_dir.to_string_lossy())
    );
    if !args.is_empty() {
        let list: Vec<String> = args.iter().map(|a| quote(&format!("\"{}\"", a))).collect();
        script.push_str(" -ArgumentList ");
        script.push_str(&list.join(","));
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_process_script() {
        let script = start_process_script(
            "C:\\telepath.exe",
            &["daemon-foreground".to_string(), "C:\\it's logs".to_string()],
            Path::new("C:\\"),
        );
        assert!(script.contains("-Verb RunAs"));
        assert!(script.contains("'\"C:\\it''s logs\"'"));
    }
}
