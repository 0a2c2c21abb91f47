//! Build orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::Serialize;
use tote_config::{BuildConfig, ConfigValidator, SchemaValidator};
use tote_graph::{ModuleGraph, NativeRuntime, Runtime, canonical_path};
use tracing::info;

use crate::chunk::{Chunk, ChunkSplitter, GroupRule};
use crate::graph_builder::DependencyGraphBuilder;
use crate::library::{LibraryBuild, LibraryReport};
use crate::link::ExternalLinkResolver;
use crate::output::writer::clean_output_dir;
use crate::output::{BuildManifest, OutputEmitter, OutputFile};
use crate::pool::WorkerPool;
use crate::resolver::ModuleResolver;
use crate::transform::{Transform, TransformRegistry, TransformScheduler};
use crate::{Error, Result};

/// Successful build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub build_hash: String,
    pub out_dir: PathBuf,
    pub chunks: Vec<Chunk>,
    /// Every written file, in chunk order.
    pub files: Vec<OutputFile>,
    pub modules: usize,
    #[serde(skip)]
    pub duration: Duration,
}

impl BuildReport {
    pub fn files_for<'a>(&'a self, chunk: &'a str) -> impl Iterator<Item = &'a OutputFile> + 'a {
        self.files.iter().filter(move |file| file.chunk == chunk)
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().filter(|f| !f.compressed).map(|f| f.size).sum()
    }
}

/// Failed build: every error found plus whatever was written before or
/// alongside the failure.
#[derive(Debug, thiserror::Error)]
#[error("build failed with {} error(s)", .errors.len())]
pub struct BuildFailure {
    pub errors: Vec<Error>,
    pub outputs: Vec<OutputFile>,
}

impl From<Error> for BuildFailure {
    fn from(error: Error) -> Self {
        Self {
            errors: error.into_errors(),
            outputs: Vec::new(),
        }
    }
}

impl miette::Diagnostic for BuildFailure {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new("tote::build"))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        Some(Box::new(self.errors.iter().map(|e| e as &dyn miette::Diagnostic)))
    }
}

/// Runs builds for one configuration.
///
/// Programmatic transforms and grouping rules are appended after the ones
/// the configuration declares.
#[derive(Debug)]
pub struct Bundler {
    config: BuildConfig,
    root: PathBuf,
    runtime: Arc<dyn Runtime>,
    transforms: Vec<Transform>,
    group_rules: Vec<GroupRule>,
}

impl Bundler {
    /// Validate `config` and build against the host filesystem.
    ///
    /// The root (from the config, else the working directory) is
    /// canonicalized, so ids written into output stay relative even when it
    /// is reached through a symlink.
    pub fn new(config: BuildConfig) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let root = canonical_path(&config.root_or(&cwd))?;
        let runtime: Arc<dyn Runtime> = Arc::new(NativeRuntime::new(&root));
        Self::with_root(config, root, runtime)
    }

    /// Build through a custom runtime; the root falls back to its cwd.
    pub fn with_runtime(config: BuildConfig, runtime: Arc<dyn Runtime>) -> Result<Self> {
        let cwd = runtime.get_cwd().map_err(std::io::Error::other)?;
        let root = canonical_path(&config.root_or(&cwd))?;
        Self::with_root(config, root, runtime)
    }

    fn with_root(config: BuildConfig, root: PathBuf, runtime: Arc<dyn Runtime>) -> Result<Self> {
        SchemaValidator.validate(&config)?;
        Ok(Self {
            config,
            root,
            runtime,
            transforms: Vec::new(),
            group_rules: Vec::new(),
        })
    }

    /// Register a transform after the configured loaders.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn grouping_rule(mut self, rule: GroupRule) -> Self {
        self.group_rules.push(rule);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry chunk name → specifiers.
    pub fn entries(&self) -> IndexMap<String, Vec<String>> {
        self.config
            .entry
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    value.specifiers().into_iter().map(str::to_string).collect(),
                )
            })
            .collect()
    }

    /// Load links, then resolve and transform everything reachable.
    ///
    /// A bad manifest fails before any module is resolved.
    pub async fn graph(&self) -> Result<ModuleGraph> {
        let links = ExternalLinkResolver::from_config(&self.runtime, &self.root, &self.config).await?;
        let resolver = ModuleResolver::from_config(
            Arc::clone(&self.runtime),
            &self.root,
            &self.config,
            Arc::new(links),
        );

        let mut registry = TransformRegistry::from_rules(&self.config.transforms)?;
        for transform in &self.transforms {
            registry.push(transform.clone());
        }
        let pool = WorkerPool::with_workers(self.config.worker_count)
            .with_timeout(self.config.transform_timeout());
        info!(workers = pool.size(), transforms = registry.len(), "building module graph");
        let scheduler = TransformScheduler::new(Arc::clone(&self.runtime), registry, pool);

        DependencyGraphBuilder::new(Arc::new(resolver), Arc::new(scheduler))
            .warn_on_cycles(self.config.warn_on_cycles)
            .build(&self.entries())
            .await
    }

    pub fn splitter(&self) -> Result<ChunkSplitter> {
        let mut splitter = ChunkSplitter::from_config(&self.config)?;
        for rule in &self.group_rules {
            splitter = splitter.rule(rule.clone());
        }
        Ok(splitter)
    }

    /// Graph, split, emit, then write the build manifest.
    ///
    /// # Errors
    ///
    /// A [`BuildFailure`] with every error found. When emission fails for
    /// some chunks, the files the others wrote are in `outputs`.
    pub async fn build(&self) -> std::result::Result<BuildReport, BuildFailure> {
        let started = Instant::now();
        let graph = Arc::new(self.graph().await?);
        let chunks = self.splitter()?.split(&graph);
        info!(chunks = chunks.len(), "chunks split");

        let emitter = OutputEmitter::from_config(Arc::clone(&graph), &self.root, &self.config)?;
        let files = self.emit(&emitter, &chunks).await?;

        BuildManifest::new(emitter.build_hash(), &chunks, &files, &self.root)
            .write(emitter.out_dir())
            .map_err(|e| BuildFailure {
                errors: vec![e],
                outputs: files.clone(),
            })?;

        let report = BuildReport {
            build_hash: emitter.build_hash().to_string(),
            out_dir: emitter.out_dir().to_path_buf(),
            chunks,
            files,
            modules: graph.len(),
            duration: started.elapsed(),
        };
        info!(
            files = report.files.len(),
            bytes = report.total_size(),
            ms = report.duration.as_millis() as u64,
            "build complete"
        );
        Ok(report)
    }

    /// Build every entry as a link library and write its manifest.
    pub async fn build_library(&self) -> std::result::Result<LibraryReport, BuildFailure> {
        let started = Instant::now();
        let graph = Arc::new(self.graph().await?);
        let chunks = ChunkSplitter::library().split(&graph);

        let emitter = OutputEmitter::from_config(Arc::clone(&graph), &self.root, &self.config)?
            .library(self.config.library.binding_name.clone());
        let files = self.emit(&emitter, &chunks).await?;

        let libraries = LibraryBuild::new(&emitter, &self.config.library.manifest_filename, &self.root)
            .write_manifests(&chunks, &self.entries(), &files)
            .map_err(|e| BuildFailure {
                errors: vec![e],
                outputs: files.clone(),
            })?;

        Ok(LibraryReport {
            build_hash: emitter.build_hash().to_string(),
            chunks,
            files,
            libraries,
            duration: started.elapsed(),
        })
    }

    async fn emit(
        &self,
        emitter: &OutputEmitter,
        chunks: &[Chunk],
    ) -> std::result::Result<Vec<OutputFile>, BuildFailure> {
        if self.config.clean {
            clean_output_dir(emitter.out_dir(), &self.root)?;
        }
        let pool = WorkerPool::with_workers(self.config.worker_count);
        let (files, errors) = emitter.emit_all(chunks, &pool).await;
        if errors.is_empty() {
            Ok(files)
        } else {
            Err(BuildFailure {
                errors,
                outputs: files,
            })
        }
    }
}
