use std::path::Path;

use serde::Serialize;

use super::OutputFile;
use super::writer::{validate_output_path, write_files_atomic};
use crate::chunk::{Chunk, ChunkKind};
use crate::{Error, Result};

pub const BUILD_MANIFEST_FILENAME: &str = "tote-manifest.json";

/// Summary of one build written next to its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub build_hash: String,
    pub chunks: Vec<ChunkManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkManifest {
    pub name: String,
    pub kind: ChunkKind,
    pub modules: Vec<String>,
    /// Chunks to load first, in load order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    pub files: Vec<OutputFile>,
}

impl BuildManifest {
    pub fn new(build_hash: impl Into<String>, chunks: &[Chunk], files: &[OutputFile], root: &Path) -> Self {
        let chunks = chunks
            .iter()
            .map(|chunk| ChunkManifest {
                name: chunk.name.clone(),
                kind: chunk.kind,
                modules: chunk.modules.iter().map(|id| id.display_relative(root)).collect(),
                requires: chunk.requires.clone(),
                files: files.iter().filter(|f| f.chunk == chunk.name).cloned().collect(),
            })
            .collect();
        Self {
            build_hash: build_hash.into(),
            chunks,
        }
    }

    pub fn write(&self, out_dir: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| Error::emit("manifest", e))?;
        let target = validate_output_path(out_dir, BUILD_MANIFEST_FILENAME)?;
        write_files_atomic(&[(target, json)]).map_err(|e| Error::emit("manifest", e))
    }
}
