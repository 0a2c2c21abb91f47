use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use path_clean::PathClean;
use tokio::task;

use super::{Runtime, RuntimeError, RuntimeResult};

/// Runtime backed by the host filesystem. Reads run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct NativeRuntime {
    cwd: PathBuf,
}

impl NativeRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path).clean()
        }
    }
}

fn runtime_error(path: PathBuf, err: io::Error) -> RuntimeError {
    match err.kind() {
        io::ErrorKind::NotFound => RuntimeError::FileNotFound(path),
        _ => RuntimeError::Io(format!("{}: {err}", path.display())),
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.absolute(path);
        task::spawn_blocking(move || std::fs::read(&path).map_err(|e| runtime_error(path, e)))
            .await
            .map_err(|e| RuntimeError::Other(format!("read task failed: {e}")))?
    }

    fn is_file(&self, path: &Path) -> bool {
        self.absolute(path).is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.absolute(path).is_dir()
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}
