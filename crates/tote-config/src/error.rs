//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no tote config found in {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// Parsing or layering failed, including unknown keys.
    #[error("invalid configuration{}: {message}", .path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("invalid config value for '{field}': {hint}")]
    InvalidValue { field: String, hint: String },

    #[error("no entries specified")]
    NoEntries,

    #[error("entry '{0}' lists no specifiers")]
    EmptyEntry(String),

    #[error("invalid regular expression in '{field}': {pattern} ({message})")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },

    #[error("invalid filename template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("chunk name '{0}' is used more than once")]
    DuplicateChunkName(String),

    // Filesystem validation errors (for CLI use)
    #[error("entry path not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    #[error("external manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn parse(path: Option<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            path,
            message: err.to_string(),
        }
    }
}
