//! Link-library builds.
//!
//! Each entry becomes a self-contained chunk that registers a loader under
//! its binding name. After the chunk is written, a [`LinkManifest`] records
//! the binding, the artifact's hash and which module every entry specifier
//! maps to, for later builds to link against.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use tote_config::{FilenameTemplate, TemplateValues};
use tracing::info;

use crate::chunk::Chunk;
use crate::link::{LinkManifest, content_hash};
use crate::output::writer::{validate_output_path, write_files_atomic};
use crate::output::{OutputEmitter, OutputFile};
use crate::{Error, Result};

/// A written link manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryArtifact {
    /// Manifest path relative to the output directory.
    pub manifest_path: PathBuf,
    pub manifest: LinkManifest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryReport {
    pub build_hash: String,
    pub chunks: Vec<Chunk>,
    pub files: Vec<OutputFile>,
    pub libraries: Vec<LibraryArtifact>,
    #[serde(skip)]
    pub duration: Duration,
}

/// Writes the link manifests for emitted library chunks.
#[derive(Debug)]
pub struct LibraryBuild<'a> {
    emitter: &'a OutputEmitter,
    manifest_filename: &'a FilenameTemplate,
    root: &'a Path,
}

impl<'a> LibraryBuild<'a> {
    pub fn new(emitter: &'a OutputEmitter, manifest_filename: &'a FilenameTemplate, root: &'a Path) -> Self {
        Self {
            emitter,
            manifest_filename,
            root,
        }
    }

    /// One manifest per chunk.
    ///
    /// `entries` maps chunk names to the specifiers the chunk was built
    /// from; each becomes a binding to the module it resolved to.
    pub fn write_manifests(
        &self,
        chunks: &[Chunk],
        entries: &IndexMap<String, Vec<String>>,
        files: &[OutputFile],
    ) -> Result<Vec<LibraryArtifact>> {
        let mut written = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let binding = self
                .emitter
                .binding_for(chunk)
                .ok_or_else(|| Error::emit(&chunk.name, "emitter is not in library mode"))?;
            let primary = files
                .iter()
                .find(|file| file.chunk == chunk.name && !file.compressed)
                .ok_or_else(|| Error::emit(&chunk.name, "no artifact was written for the library"))?;

            let artifact_path = self.emitter.out_dir().join(&primary.path);
            let artifact_bytes = std::fs::read(&artifact_path).map_err(|e| Error::Manifest {
                path: artifact_path.clone(),
                message: e.to_string(),
            })?;

            let bindings = entries
                .get(&chunk.name)
                .into_iter()
                .flatten()
                .zip(&chunk.entry_modules)
                .map(|(specifier, id)| (specifier.clone(), id.display_relative(self.root)))
                .collect();

            let manifest_path = PathBuf::from(self.manifest_filename.render(&TemplateValues {
                name: &chunk.name,
                hash: self.emitter.build_hash(),
                content_hash: &content_hash(&artifact_bytes),
            }));

            let manifest = LinkManifest {
                library_name: chunk.name.clone(),
                global_binding_name: binding,
                content_hash: content_hash(&artifact_bytes),
                artifact: relative_to_manifest(&manifest_path, &primary.path),
                bindings,
            };

            let target = validate_output_path(self.emitter.out_dir(), &manifest_path.to_string_lossy())?;
            write_files_atomic(&[(target, manifest.to_json()?.into_bytes())])
                .map_err(|e| Error::emit(&chunk.name, e))?;

            info!(
                library = %manifest.library_name,
                binding = %manifest.global_binding_name,
                manifest = %manifest_path.display(),
                "library manifest written"
            );
            written.push(LibraryArtifact {
                manifest_path,
                manifest,
            });
        }

        Ok(written)
    }
}

/// Path of `artifact` as seen from the directory holding `manifest`; both
/// are relative to the output directory.
fn relative_to_manifest(manifest: &Path, artifact: &Path) -> PathBuf {
    let depth = manifest
        .parent()
        .map(|dir| dir.components().filter(|c| matches!(c, Component::Normal(_))).count())
        .unwrap_or(0);
    let mut path = PathBuf::new();
    for _ in 0..depth {
        path.push("..");
    }
    path.join(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_are_relative_to_the_manifest() {
        assert_eq!(
            relative_to_manifest(Path::new("react.manifest.json"), Path::new("react.js")),
            PathBuf::from("react.js")
        );
        assert_eq!(
            relative_to_manifest(Path::new("manifests/react.json"), Path::new("js/react.js")),
            PathBuf::from("../js/react.js")
        );
    }
}
