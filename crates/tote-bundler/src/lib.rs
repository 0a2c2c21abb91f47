#![cfg_attr(docsrs, feature(doc_cfg))]

//! # tote-bundler
//!
//! The build engine behind `tote`: it turns named entry modules into chunk
//! artifacts.
//!
//! A build runs in fixed phases:
//!
//! 1. external link manifests are loaded and verified against their artifacts
//! 2. the [`DependencyGraphBuilder`] resolves and transforms every reachable
//!    module on a bounded [`WorkerPool`]
//! 3. the [`ChunkSplitter`] partitions the frozen graph
//! 4. the [`OutputEmitter`] renders each chunk, runs the configured stages and
//!    writes the files
//!
//! ## Quick Start
//!
//! ```no_run
//! use tote_bundler::{BuildConfig, Bundler};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BuildConfig::new("main", "./src/index.js");
//! let report = Bundler::new(config)?.build().await?;
//! for file in &report.files {
//!     println!("{} ({} bytes) from {}", file.path.display(), file.size, file.chunk);
//! }
//! # Ok(()) }
//! ```
//!
//! ## Custom transforms
//!
//! Transforms are appended as predicate/function pairs; the first match wins.
//!
//! ```no_run
//! use tote_bundler::{BuildConfig, Bundler, Transform};
//!
//! # fn example() -> tote_bundler::Result<()> {
//! let upper = Transform::new(
//!     "upper",
//!     |id| id.as_path().extension().is_some_and(|ext| ext == "txt"),
//!     |_, content| Ok(content.to_ascii_uppercase().into()),
//! );
//! let bundler = Bundler::new(BuildConfig::new("main", "./src/index.js"))?.transform(upper);
//! # Ok(()) }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub use tote_config::{BuildConfig, ConfigError};
pub use tote_graph::*;

pub mod bundler;
pub mod chunk;
pub mod graph_builder;
pub mod library;
pub mod link;
pub mod output;
pub mod pool;
pub mod resolver;
pub mod scan;
pub mod transform;

pub use bundler::{BuildFailure, BuildReport, Bundler};
pub use chunk::{Chunk, ChunkKind, ChunkSplitter, GroupRule, SplitOptions};
pub use graph_builder::DependencyGraphBuilder;
pub use library::{LibraryBuild, LibraryReport};
pub use link::{ExternalLinkResolver, LinkManifest};
pub use output::{OutputEmitter, OutputFile};
pub use pool::WorkerPool;
pub use resolver::ModuleResolver;
pub use transform::{
    Transform, TransformContext, TransformJob, TransformOutput, TransformRegistry,
    TransformScheduler, TransformedModule,
};

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

/// Error types for tote-bundler operations.
///
/// Every variant that concerns a single module, specifier or chunk carries it,
/// so aggregated reports stay actionable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A specifier could not be mapped to a module or an external slot.
    #[error("cannot resolve '{specifier}'{}: {reason}", importer_suffix(.importer.as_ref()))]
    Resolution {
        specifier: String,
        importer: Option<ModuleId>,
        reason: String,
    },

    /// A module's source could not be read.
    #[error("failed to load {module}: {message}")]
    Load { module: ModuleId, message: String },

    /// A registered transform raised on a module's content.
    #[error("transform '{transform}' failed for {module}: {message}")]
    Transform {
        module: ModuleId,
        transform: String,
        message: String,
    },

    /// A script still uses `import`/`export` after its transform (if any) ran.
    #[error("{module}:{line} uses ES module syntax (`{statement}`), which the CommonJS module wrapper cannot run")]
    ModuleSyntax {
        module: ModuleId,
        line: usize,
        statement: String,
    },

    /// A worker exceeded the per-job budget.
    #[error("transform of {module} timed out after {}ms", .timeout.as_millis())]
    TransformTimeout { module: ModuleId, timeout: Duration },

    /// The external manifest no longer matches the artifact next to it.
    #[error(
        "manifest {} does not match {} (expected {expected}, found {actual})",
        .manifest.display(),
        .artifact.display()
    )]
    ManifestMismatch {
        manifest: PathBuf,
        artifact: PathBuf,
        expected: String,
        actual: String,
    },

    /// The external manifest could not be read or parsed.
    #[error("invalid manifest {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    /// Every per-module problem collected while building the graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A stage or the writer failed for one chunk.
    #[error("failed to emit chunk '{chunk}': {message}")]
    Emit { chunk: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("graph invariant violated: {0}")]
    Model(#[from] GraphModelError),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn importer_suffix(importer: Option<&ModuleId>) -> String {
    importer
        .map(|id| format!(" from {id}"))
        .unwrap_or_default()
}

/// Result type alias for tote-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Aggregate of the per-module errors found in one graph build.
#[derive(Debug, thiserror::Error)]
#[error("{} problem(s) found while building the module graph", .errors.len())]
pub struct GraphError {
    pub errors: Vec<Error>,
}

impl GraphError {
    /// Sort by the module or specifier each error is tagged with, so reports
    /// do not depend on which worker finished first.
    pub fn new(mut errors: Vec<Error>) -> Self {
        errors.sort_by(|a, b| a.subject().cmp(&b.subject()));
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Error {
    pub fn resolution(
        specifier: impl Into<String>,
        importer: Option<&ModuleId>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            specifier: specifier.into(),
            importer: importer.cloned(),
            reason: reason.into(),
        }
    }

    pub fn emit(chunk: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Emit {
            chunk: chunk.into(),
            message: message.to_string(),
        }
    }

    /// The module, specifier, chunk or file the error is about.
    pub fn subject(&self) -> String {
        match self {
            Error::Resolution {
                specifier,
                importer,
                ..
            } => match importer {
                Some(importer) => format!("{importer} -> {specifier}"),
                None => specifier.clone(),
            },
            Error::Load { module, .. }
            | Error::Transform { module, .. }
            | Error::ModuleSyntax { module, .. }
            | Error::TransformTimeout { module, .. } => module.to_string(),
            Error::ManifestMismatch { manifest, .. } => manifest.display().to_string(),
            Error::Manifest { path, .. } => path.display().to_string(),
            Error::Emit { chunk, .. } => chunk.clone(),
            Error::Graph(_)
            | Error::Config(_)
            | Error::Model(_)
            | Error::InvalidOutputPath(_)
            | Error::Io(_) => String::new(),
        }
    }

    /// Flatten aggregates into their individual errors.
    pub fn into_errors(self) -> Vec<Error> {
        match self {
            Error::Graph(graph) => graph.errors,
            other => vec![other],
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Resolution { .. } => "tote::resolution",
            Error::Load { .. } => "tote::load",
            Error::Transform { .. } => "tote::transform",
            Error::ModuleSyntax { .. } => "tote::module_syntax",
            Error::TransformTimeout { .. } => "tote::timeout",
            Error::ManifestMismatch { .. } => "tote::manifest_mismatch",
            Error::Manifest { .. } => "tote::manifest",
            Error::Graph(_) => "tote::graph",
            Error::Emit { .. } => "tote::emit",
            Error::Config(_) => "tote::config",
            Error::Model(_) => "tote::internal",
            Error::InvalidOutputPath(_) => "tote::output_path",
            Error::Io(_) => "tote::io",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Resolution { .. } => Some(Box::new(
                "Check the path and extension, or declare the package under `externals` or `resolve.alias`.",
            )),
            Error::ModuleSyntax { .. } => Some(Box::new(
                "Register a transform for this file that compiles `import`/`export` to `require`/`module.exports`.",
            )),
            Error::TransformTimeout { .. } => Some(Box::new(
                "Raise `transformTimeoutMs` or check the transform for runaway work.",
            )),
            Error::ManifestMismatch { .. } => Some(Box::new(
                "The library artifact changed after its manifest was written. Rebuild it with `tote library`.",
            )),
            Error::Config(_) => Some(Box::new("Check your configuration file for typos and invalid values.")),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{path}' is invalid. Keep output inside the output directory."
            ))),
            Error::Emit { .. } => Some(Box::new("Check disk space and permissions for the output directory.")),
            _ => None,
        }
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        match self {
            Error::Graph(graph) => Some(Box::new(
                graph.errors.iter().map(|e| e as &dyn miette::Diagnostic),
            )),
            _ => None,
        }
    }
}
