//! Hidden completion command used by the shell completion scripts.
//!
//! Invoked as `telepath __complete <flag> <partial> -- <words before the cursor>`.
//! Prints one candidate per line followed by a `:<directive>` line.

use telepath_core::adapters::ProcessEnvironment;
use telepath_core::kubernetes::KubectlDiscovery;
use telepath_core::request::{
    complete_clusters, complete_namespaces, request_from_line, CompletionError,
};
use tracing::debug;

/// Candidates are complete; the shell must not fall back to file names.
const DIRECTIVE_NO_FILE_COMP: u8 = 4;
/// Completion failed; the shell should offer nothing.
const DIRECTIVE_ERROR: u8 = 1;

pub async fn run(flag: &str, partial: &str, words: &[String]) {
    match candidates(flag, partial, words).await {
        Ok(candidates) => {
            for candidate in candidates {
                println!("{}", candidate);
            }
            println!(":{}", DIRECTIVE_NO_FILE_COMP);
        }
        Err(e) => {
            debug!(error = %e, "completion failed");
            println!(":{}", DIRECTIVE_ERROR);
        }
    }
}

async fn candidates(
    flag: &str,
    partial: &str,
    words: &[String],
) -> Result<Vec<String>, CompletionError> {
    let request = request_from_line(words, &ProcessEnvironment)?;
    match flag {
        "namespace" | "mapped-namespaces" | "manager-namespace" => {
            complete_namespaces(&KubectlDiscovery::new(), &request, partial).await
        }
        "cluster" => {
            let config = request.get_config(&ProcessEnvironment)?;
            Ok(complete_clusters(&config, partial))
        }
        other => Err(CompletionError::UnknownFlag(other.to_string())),
    }
}
