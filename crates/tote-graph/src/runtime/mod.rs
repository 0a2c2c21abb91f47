//! Platform runtime abstraction.
//!
//! The bundler never touches the filesystem directly while building the
//! graph; it goes through a [`Runtime`] so tests can substitute an
//! in-memory tree and embedders can serve virtual files.

#[cfg(not(target_family = "wasm"))]
pub mod native;

#[cfg(any(
    all(test, not(target_family = "wasm")),
    all(feature = "test-utils", not(target_family = "wasm"))
))]
pub mod test_utils;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

/// File access used by resolution, loading and manifest verification.
///
/// Existence checks are synchronous because resolution probes many
/// candidates per specifier and runs on the coordinating task; reads are
/// async and expected to move blocking work off that task.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// `true` when `path` exists and is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Working directory that relative entry specifiers resolve against.
    fn get_cwd(&self) -> RuntimeResult<PathBuf>;
}
