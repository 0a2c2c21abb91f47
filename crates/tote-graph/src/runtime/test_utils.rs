//! In-memory runtime for tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;

use super::{Runtime, RuntimeError, RuntimeResult};

/// A runtime whose whole filesystem is a map of absolute paths to bytes.
///
/// Directories exist implicitly as ancestors of inserted files.
#[derive(Debug, Clone)]
pub struct MemoryRuntime {
    files: Arc<RwLock<FxHashMap<PathBuf, Vec<u8>>>>,
    cwd: PathBuf,
}

impl MemoryRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            files: Arc::new(RwLock::new(FxHashMap::default())),
            cwd: cwd.into(),
        }
    }

    /// Insert a file; relative paths are placed under the runtime cwd.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> &Self {
        let path = self.normalize(path.as_ref());
        self.files.write().insert(path, content.into());
        self
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.cwd.join(path).clean()
        }
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.normalize(path);
        self.files
            .read()
            .get(&path)
            .cloned()
            .ok_or(RuntimeError::FileNotFound(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(&self.normalize(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = self.normalize(path);
        self.files
            .read()
            .keys()
            .any(|file| file != &dir && file.starts_with(&dir))
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}
