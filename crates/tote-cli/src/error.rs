//! Error types for the tote CLI.
//!
//! Build failures keep every individual error so they can be printed one
//! per line; a missing configuration carries a hint.

use std::path::PathBuf;

use miette::Report;
use thiserror::Error;
use tote_bundler::BuildFailure;
use tote_config::ConfigError;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Every error a build (or library build) produced.
    #[error("{0}")]
    Build(#[from] BuildFailure),

    #[error("{0}")]
    Bundler(#[from] tote_bundler::Error),

    #[error("No configuration found in {}\n\nHint: Create tote.toml, pass --config PATH, or give entries with --entry NAME=SPEC", .0.display())]
    NoConfig(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Render aggregated failures with one error per line.
pub fn format_failure(failure: &BuildFailure) -> String {
    let mut message = failure.to_string();
    message.push(':');
    for error in &failure.errors {
        message.push_str("\n  ");
        message.push_str(&error.to_string());
    }
    if !failure.outputs.is_empty() {
        message.push_str(&format!(
            "\n\n{} file(s) were written before the failure",
            failure.outputs.len()
        ));
    }
    message
}

/// Convert a `CliError` into a miette report for the top-level handler.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(failure) => miette::miette!(code = "tote::build", "{}", format_failure(&failure)),
        CliError::Bundler(error) => match error {
            tote_bundler::Error::Graph(graph) => {
                let failure = BuildFailure {
                    errors: graph.errors,
                    outputs: Vec::new(),
                };
                miette::miette!(code = "tote::graph", "{}", format_failure(&failure))
            }
            other => Report::new(other),
        },
        CliError::Config(e) => miette::miette!(
            code = "tote::config",
            help = "Check your configuration file for typos and invalid values",
            "Configuration error: {}",
            e
        ),
        other => miette::miette!("{}", other),
    }
}
