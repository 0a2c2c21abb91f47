//! Link-library manifests.
//!
//! A library build writes, next to each prebuilt artifact, a manifest naming
//! the global binding the artifact registers and the module each exposed
//! specifier maps to. A later build loads these manifests so imports of the
//! library become [`ExternalSlot`]s instead of graph modules.
//!
//! The manifest stores the blake3 hash of its artifact; loading recomputes
//! it and refuses a manifest whose artifact has drifted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tote_config::BuildConfig;
use tote_graph::{ExternalSlot, Runtime};
use tracing::{debug, info};

use crate::{Error, Result};

/// On-disk manifest written by a library build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkManifest {
    pub library_name: String,
    pub global_binding_name: String,
    /// blake3 hex digest of the artifact.
    pub content_hash: String,
    /// Artifact path relative to the manifest's directory.
    pub artifact: PathBuf,
    /// Exposed specifier → module id inside the library.
    pub bindings: IndexMap<String, String>,
}

impl LinkManifest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Manifest {
            path: PathBuf::from(&self.library_name),
            message: e.to_string(),
        })
    }

    pub fn slot(&self, specifier: &str) -> Option<ExternalSlot> {
        self.bindings.get(specifier).map(|module| {
            ExternalSlot::linked(
                &self.library_name,
                &self.global_binding_name,
                &self.content_hash,
                module,
            )
        })
    }
}

/// blake3 hex digest used for manifest verification.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Every loaded manifest, indexed by exposed specifier.
#[derive(Debug, Default)]
pub struct ExternalLinkResolver {
    manifests: Vec<LinkManifest>,
    by_specifier: FxHashMap<String, usize>,
}

impl ExternalLinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every linked external declared in `config`.
    ///
    /// The first failure aborts: a drifted or unreadable manifest
    /// invalidates the whole build.
    pub async fn from_config(
        runtime: &Arc<dyn Runtime>,
        root: &Path,
        config: &BuildConfig,
    ) -> Result<Self> {
        let mut resolver = Self::new();
        for external in &config.externals {
            let Some(manifest_path) = &external.manifest_path else {
                continue;
            };
            let path = root.join(manifest_path);
            let manifest = resolver.load(runtime.as_ref(), &path).await?;
            if manifest.library_name != external.library_name {
                return Err(Error::Manifest {
                    path,
                    message: format!(
                        "declares library '{}' but the config expects '{}'",
                        manifest.library_name, external.library_name
                    ),
                });
            }
        }
        Ok(resolver)
    }

    /// Read, verify and register the manifest at `path`.
    pub async fn load(&mut self, runtime: &dyn Runtime, path: &Path) -> Result<LinkManifest> {
        let bytes = runtime.read_file(path).await.map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let manifest: LinkManifest = serde_json::from_slice(&bytes).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let artifact = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&manifest.artifact);
        let artifact_bytes = runtime.read_file(&artifact).await.map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: format!("cannot read artifact {}: {e}", artifact.display()),
        })?;

        let actual = content_hash(&artifact_bytes);
        if actual != manifest.content_hash {
            return Err(Error::ManifestMismatch {
                manifest: path.to_path_buf(),
                artifact,
                expected: manifest.content_hash.clone(),
                actual,
            });
        }

        info!(
            library = %manifest.library_name,
            binding = %manifest.global_binding_name,
            bindings = manifest.bindings.len(),
            "linked external library"
        );
        self.register(manifest.clone());
        Ok(manifest)
    }

    /// Register an already verified manifest. Earlier manifests keep
    /// specifiers they share with later ones.
    pub fn register(&mut self, manifest: LinkManifest) {
        let index = self.manifests.len();
        for specifier in manifest.bindings.keys() {
            if self.by_specifier.contains_key(specifier) {
                debug!(specifier = %specifier, library = %manifest.library_name, "binding already linked");
                continue;
            }
            self.by_specifier.insert(specifier.clone(), index);
        }
        self.manifests.push(manifest);
    }

    /// The slot `specifier` is linked to, if any library exposes it.
    pub fn is_linked(&self, specifier: &str) -> Option<ExternalSlot> {
        let index = *self.by_specifier.get(specifier)?;
        self.manifests.get(index)?.slot(specifier)
    }

    pub fn manifests(&self) -> &[LinkManifest] {
        &self.manifests
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}
