use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tote_config::{BuildConfig, FilenameTemplate, TemplateValues};
use tote_graph::{ContentType, ModuleGraph};
use tracing::{debug, info};

use super::OutputFile;
use super::render::{ChunkRenderer, RenderMode, concat};
use super::stages::{self, Artifact, Stage, StageContext};
use super::writer::{normalize_dir, validate_output_path, write_files_atomic};
use crate::chunk::Chunk;
use crate::pool::WorkerPool;
use crate::{Error, Result};

/// blake3 over every module id and its final content, in graph order.
pub fn build_hash(graph: &ModuleGraph, root: &Path) -> String {
    let mut hasher = blake3::Hasher::new();
    for record in graph.modules() {
        let id = record.id().display_relative(root);
        hasher.update(&(id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
        hasher.update(&(record.content().len() as u64).to_le_bytes());
        hasher.update(record.content());
    }
    hasher.finalize().to_hex().to_string()
}

/// Renders chunks, runs them through the stage pipeline and writes the
/// results under the output directory.
///
/// Cloning is cheap; [`OutputEmitter::emit_all`] hands clones to pool workers.
#[derive(Debug, Clone)]
pub struct OutputEmitter {
    graph: Arc<ModuleGraph>,
    root: PathBuf,
    out_dir: PathBuf,
    filename: FilenameTemplate,
    stages: Vec<Arc<dyn Stage>>,
    build_hash: String,
    library_binding: Option<FilenameTemplate>,
}

impl OutputEmitter {
    /// Emitter with no stages. `out_dir` is taken relative to `root`.
    pub fn new(
        graph: Arc<ModuleGraph>,
        root: impl Into<PathBuf>,
        out_dir: impl AsRef<Path>,
        filename: FilenameTemplate,
    ) -> Self {
        let root = root.into();
        let out_dir = normalize_dir(out_dir.as_ref(), &root);
        let build_hash = build_hash(&graph, &root);
        Self {
            graph,
            root,
            out_dir,
            filename,
            stages: Vec::new(),
            build_hash,
            library_binding: None,
        }
    }

    /// Emitter using the config's output directory, filename pattern and
    /// emit stages, in that order.
    ///
    /// # Errors
    ///
    /// Fails when a stage cannot be compiled, e.g. a bad `test` pattern.
    pub fn from_config(graph: Arc<ModuleGraph>, root: impl Into<PathBuf>, config: &BuildConfig) -> Result<Self> {
        let mut emitter = Self::new(
            graph,
            root,
            &config.output_dir,
            config.output_filename_pattern.clone(),
        );
        for stage in &config.emit_stages {
            emitter.stages.push(Arc::from(stages::compile(stage)?));
        }
        Ok(emitter)
    }

    /// Append a stage after the configured ones.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Render chunks as libraries exposed under `binding` instead of running
    /// their entries.
    pub fn library(mut self, binding: FilenameTemplate) -> Self {
        self.library_binding = Some(binding);
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn build_hash(&self) -> &str {
        &self.build_hash
    }

    /// Global binding a library chunk registers under.
    pub fn binding_for(&self, chunk: &Chunk) -> Option<String> {
        self.library_binding.as_ref().map(|template| {
            template.render(&TemplateValues {
                name: &chunk.name,
                hash: &self.build_hash,
                content_hash: &self.build_hash,
            })
        })
    }

    /// The chunk's primary artifact before any stage ran.
    pub fn render(&self, chunk: &Chunk) -> Artifact {
        let binding = self.binding_for(chunk);
        let mode = match &binding {
            Some(binding) => RenderMode::Library { binding },
            None => RenderMode::App,
        };
        let segments = ChunkRenderer::new(&self.graph, &self.root).render(chunk, mode);

        let content_hash = if self.filename.uses_content_hash() {
            blake3::hash(concat(&segments).as_bytes()).to_hex().to_string()
        } else {
            String::new()
        };
        let filename = self.filename.render(&TemplateValues {
            name: &chunk.name,
            hash: &self.build_hash,
            content_hash: &content_hash,
        });
        Artifact::rendered(filename, ContentType::Script, segments)
    }

    /// Render, stage and write one chunk.
    ///
    /// The chunk's files are written together or not at all.
    pub fn emit(&self, chunk: &Chunk) -> Result<Vec<OutputFile>> {
        let mut artifacts = vec![self.render(chunk)];
        let cx = StageContext {
            chunk,
            build_hash: &self.build_hash,
        };
        for stage in &self.stages {
            artifacts = stage
                .apply(artifacts, &cx)
                .map_err(|e| Error::emit(&chunk.name, format!("{} stage: {e:#}", stage.name())))?;
        }

        let mut operations = Vec::with_capacity(artifacts.len());
        let mut files = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let target = validate_output_path(&self.out_dir, &artifact.filename)?;
            let bytes = artifact.to_bytes();
            files.push(OutputFile {
                path: PathBuf::from(&artifact.filename),
                size: bytes.len() as u64,
                chunk: chunk.name.clone(),
                content_type: artifact.content_type,
                compressed: artifact.compressed,
            });
            operations.push((target, bytes));
        }

        write_files_atomic(&operations).map_err(|e| Error::emit(&chunk.name, e))?;
        debug!(chunk = %chunk.name, files = files.len(), "chunk written");
        Ok(files)
    }

    /// Emit every chunk on `pool`.
    ///
    /// A failing chunk does not stop the others. Files come back in chunk
    /// order, followed by one error per failed chunk.
    pub async fn emit_all(&self, chunks: &[Chunk], pool: &WorkerPool) -> (Vec<OutputFile>, Vec<Error>) {
        let mut jobs = JoinSet::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let emitter = self.clone();
            let pool = pool.clone();
            let chunk = chunk.clone();
            jobs.spawn(async move {
                let name = chunk.name.clone();
                let outcome = pool
                    .run(move || emitter.emit(&chunk))
                    .await
                    .unwrap_or_else(|e| Err(Error::emit(&name, e)));
                (index, outcome)
            });
        }

        let mut results: Vec<Option<Result<Vec<OutputFile>>>> = chunks.iter().map(|_| None).collect();
        while let Some(joined) = jobs.join_next().await {
            if let Ok((index, outcome)) = joined {
                results[index] = Some(outcome);
            }
        }

        let mut files = Vec::new();
        let mut errors = Vec::new();
        for (chunk, result) in chunks.iter().zip(results) {
            match result {
                Some(Ok(chunk_files)) => files.extend(chunk_files),
                Some(Err(e)) => errors.push(e),
                None => errors.push(Error::emit(&chunk.name, "emit task ended without a result")),
            }
        }

        info!(
            chunks = chunks.len(),
            files = files.len(),
            failed = errors.len(),
            out_dir = %self.out_dir.display(),
            "emitted"
        );
        (files, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use indexmap::IndexMap;
    use tempfile::TempDir;
    use tote_config::EmitStage;
    use tote_graph::{ModuleId, ModuleRecord};

    fn graph(root: &Path) -> Arc<ModuleGraph> {
        let id = ModuleId::new(root.join("a.js")).unwrap();
        let record = ModuleRecord::builder(id.clone(), b"module.exports = 1;".to_vec()).build();
        let mut entries = IndexMap::new();
        entries.insert("main".to_string(), vec![id]);
        Arc::new(ModuleGraph::from_parts([Arc::new(record)], entries).unwrap())
    }

    fn chunk(graph: &ModuleGraph) -> Chunk {
        let mut chunk = Chunk::new("main", ChunkKind::Entry);
        chunk.entry_modules = graph.entries()["main"].clone();
        chunk.modules = chunk.entry_modules.clone();
        chunk
    }

    #[test]
    fn unstaged_output_is_the_rendered_chunk() {
        let dir = TempDir::new().unwrap();
        let graph = graph(dir.path());
        let emitter = OutputEmitter::new(
            Arc::clone(&graph),
            dir.path(),
            "dist",
            FilenameTemplate::parse("[name].js").unwrap(),
        );

        let chunk = chunk(&graph);
        let files = emitter.emit(&chunk).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, Path::new("main.js"));

        let written = std::fs::read(dir.path().join("dist/main.js")).unwrap();
        assert_eq!(written, emitter.render(&chunk).to_bytes());
        assert_eq!(files[0].size, written.len() as u64);
    }

    #[test]
    fn content_hash_names_follow_pre_stage_bytes() {
        let dir = TempDir::new().unwrap();
        let graph = graph(dir.path());
        let emitter = OutputEmitter::new(
            Arc::clone(&graph),
            dir.path(),
            "dist",
            FilenameTemplate::parse("[name].[contenthash:8].js").unwrap(),
        );
        let chunk = chunk(&graph);
        let artifact = emitter.render(&chunk);
        let expected = blake3::hash(&artifact.to_bytes()).to_hex().to_string();
        assert_eq!(artifact.filename, format!("main.{}.js", &expected[..8]));
    }

    #[test]
    fn stage_failures_are_emit_errors_for_the_chunk() {
        let dir = TempDir::new().unwrap();
        let id = ModuleId::new(dir.path().join("a.js")).unwrap();
        let record = ModuleRecord::builder(id.clone(), b"function (".to_vec()).build();
        let mut entries = IndexMap::new();
        entries.insert("main".to_string(), vec![id]);
        let graph = Arc::new(ModuleGraph::from_parts([Arc::new(record)], entries).unwrap());

        let mut config = BuildConfig::new("main", "./a.js");
        config.emit_stages = vec![EmitStage::Minify];
        let emitter = OutputEmitter::from_config(Arc::clone(&graph), dir.path(), &config).unwrap();

        let err = emitter.emit(&chunk(&graph)).unwrap_err();
        assert!(matches!(&err, Error::Emit { chunk, .. } if chunk == "main"), "{err}");
        assert!(!dir.path().join("dist/main.js").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn emit_all_keeps_chunk_order() {
        let dir = TempDir::new().unwrap();
        let graph = graph(dir.path());
        let emitter = OutputEmitter::new(
            Arc::clone(&graph),
            dir.path(),
            "dist",
            FilenameTemplate::parse("[name].js").unwrap(),
        );

        let first = chunk(&graph);
        let mut second = chunk(&graph);
        second.name = "second".to_string();
        let mut bad = chunk(&graph);
        bad.name = "../escape".to_string();

        let (files, errors) = emitter
            .emit_all(&[first, bad, second], &WorkerPool::new(2))
            .await;
        let names: Vec<_> = files.iter().map(|f| f.chunk.as_str()).collect();
        assert_eq!(names, vec!["main", "second"]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::InvalidOutputPath(_)));
    }
}
