//! Chunk emission: rendering, the stage pipeline and the writer.

mod emitter;
mod manifest;
pub mod render;
pub mod stages;
pub mod writer;

use std::path::PathBuf;

use serde::Serialize;
use tote_graph::ContentType;

pub use emitter::{OutputEmitter, build_hash};
pub use manifest::{BUILD_MANIFEST_FILENAME, BuildManifest, ChunkManifest};
pub use stages::{Artifact, ArtifactBody, Stage, StageContext};

/// A file written by the emitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    /// Relative to the output directory.
    pub path: PathBuf,
    pub size: u64,
    /// Name of the chunk the file was produced for.
    pub chunk: String,
    pub content_type: ContentType,
    pub compressed: bool,
}
