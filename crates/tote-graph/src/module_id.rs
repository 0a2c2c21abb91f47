use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Canonical identity of a module within one build.
///
/// The identity is the cleaned absolute path of the file plus an optional
/// query string, so `./a.css` and `./a.css?inline` are distinct modules while
/// `./lib/../a.css` and `/abs/a.css` collapse into one. Paths are canonicalized
/// when the file exists so symlinked imports deduplicate too.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    path: PathBuf,
    query: Option<String>,
}

impl ModuleId {
    /// Create a new module identifier from a filesystem path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }

        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| ModuleIdError::CurrentDir { source })?
                .join(path)
        };

        let cleaned = joined.clean();
        canonical_path(&cleaned)
            .map(Self::from_canonical_path)
            .map_err(|source| ModuleIdError::Canonicalization {
                path: cleaned,
                source,
            })
    }

    /// Wrap an already canonical path without touching the filesystem.
    pub fn from_canonical_path(path: PathBuf) -> Self {
        Self { path, query: None }
    }

    /// Attach a query string (without the leading `?`). Empty queries are dropped.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Directory that relative imports of this module resolve against.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }

    /// Borrow the identifier as a string for logging and serialization.
    pub fn path_string(&self) -> Cow<'_, str> {
        match &self.query {
            None => self.path.to_string_lossy(),
            Some(query) => Cow::Owned(format!("{}?{}", self.path.to_string_lossy(), query)),
        }
    }

    /// Render the identifier relative to `root` when it lives underneath it.
    ///
    /// Used for the ids written into emitted chunks so output does not leak
    /// absolute paths of the machine that produced it.
    pub fn display_relative(&self, root: &Path) -> String {
        let path = self
            .path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| self.path.to_string_lossy().replace('\\', "/"));
        match &self.query {
            None => path,
            Some(query) => format!("{path}?{query}"),
        }
    }

    fn from_serialized(value: &str) -> Self {
        match value.split_once('?') {
            Some((path, query)) => Self::from_canonical_path(PathBuf::from(path)).with_query(query),
            None => Self::from_canonical_path(PathBuf::from(value)),
        }
    }
}

impl PartialOrd for ModuleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.query.cmp(&other.query))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_string())
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(ModuleId::from_serialized(&value))
    }
}

/// Clean `path` and resolve symlinks in it when it exists.
///
/// Missing paths come back cleaned. Build roots go through this too, so
/// [`ModuleId::display_relative`] strips them from canonical module paths.
pub fn canonical_path(path: &Path) -> io::Result<PathBuf> {
    let cleaned = path.clean();

    #[cfg(target_family = "wasm")]
    {
        Ok(cleaned)
    }

    #[cfg(not(target_family = "wasm"))]
    {
        match std::fs::canonicalize(&cleaned) {
            Ok(canonical) => Ok(canonical),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(cleaned),
            Err(err) => Err(err),
        }
    }
}

/// Error type for `ModuleId` construction failures.
#[derive(Debug, Error)]
pub enum ModuleIdError {
    #[error("module id path is empty")]
    EmptyPath,

    #[error("failed to resolve current directory: {source}")]
    CurrentDir {
        #[source]
        source: io::Error,
    },

    /// Canonicalisation failed for reasons other than `NotFound`.
    #[error("failed to canonicalize path '{path}': {source}")]
    Canonicalization {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
