//! Shell completion of namespace and cluster flag values.

use clap::{CommandFactory, FromArgMatches, Parser};
use thiserror::Error;

use super::{ConnectArgs, ConnectRequest, GlobalFlags};
use crate::error::Error;
use crate::kubernetes::RawKubeconfig;
use crate::ports::{Environment, NamespaceLister};

/// Completion could not produce candidates.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no completion for flag --{0}")]
    UnknownFlag(String),

    #[error("completion failed: {0}")]
    Lookup(#[from] Error),

    #[error("unable to parse command line: {0}")]
    Line(String),
}

/// The words of a partially typed command line.
#[derive(Parser)]
#[command(no_binary_name = true, ignore_errors = true)]
struct PartialLine {
    #[command(flatten)]
    globals: GlobalFlags,

    #[command(flatten)]
    connect: ConnectArgs,

    /// Subcommand names and other positional words.
    words: Vec<String>,
}

/// Commits the flags already present on the line being completed, so that
/// `--kubeconfig`, `--context` or `-n` typed before the cursor are honored.
///
/// `words` excludes the program name and the word being completed. A
/// trailing flag that still waits for its value is ignored.
pub fn request_from_line(
    words: &[String],
    env: &impl Environment,
) -> Result<ConnectRequest, CompletionError> {
    let mut words = words;
    if let Some((last, rest)) = words.split_last() {
        if last.starts_with('-') && !last.contains('=') {
            words = rest;
        }
    }

    let matches = PartialLine::command()
        .try_get_matches_from(words)
        .map_err(|e| CompletionError::Line(e.to_string()))?;
    let line = PartialLine::from_arg_matches(&matches)
        .map_err(|e| CompletionError::Line(e.to_string()))?;
    Ok(ConnectRequest::commit(&line.connect, &line.globals, env)?)
}

/// Keeps the candidates starting with `partial`, sorted.
pub fn filter_candidates(candidates: Vec<String>, partial: &str) -> Vec<String> {
    let mut matching: Vec<String> = candidates
        .into_iter()
        .filter(|c| c.starts_with(partial))
        .collect();
    matching.sort();
    matching.dedup();
    matching
}

/// Namespaces of the cluster that start with `partial`.
pub async fn complete_namespaces(
    lister: &impl NamespaceLister,
    request: &ConnectRequest,
    partial: &str,
) -> Result<Vec<String>, CompletionError> {
    let namespaces = request.get_all_namespaces(lister).await?;
    Ok(filter_candidates(namespaces, partial))
}

/// Cluster names of the kubeconfig that start with `partial`.
pub fn complete_clusters(config: &RawKubeconfig, partial: &str) -> Vec<String> {
    filter_candidates(config.cluster_names(), partial)
}
