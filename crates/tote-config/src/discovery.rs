//! File-based config discovery and layered loading.
//!
//! Layers, lowest priority first: built-in defaults, the config file
//! (`tote.toml` or `tote.config.json`), then `TOTE_*` environment variables.
//! Command-line overrides are applied by the caller on the extracted struct.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized, Toml};
use figment::value::{Uncased, UncasedStr};
use figment::Figment;
use tracing::debug;

use crate::config::BuildConfig;
use crate::error::{ConfigError, Result};

/// Config file names searched for, in priority order.
pub const CONFIG_FILE_NAMES: &[&str] = &["tote.toml", "tote.config.json"];

/// Scalar options that may be overridden through `TOTE_<KEY>`.
const ENV_KEYS: &[(&str, &str)] = &[
    ("outputdir", "outputDir"),
    ("outputfilenamepattern", "outputFilenamePattern"),
    ("workercount", "workerCount"),
    ("transformtimeoutms", "transformTimeoutMs"),
    ("sharedchunkname", "sharedChunkName"),
    ("warnoncycles", "warnOnCycles"),
    ("clean", "clean"),
    ("root", "root"),
];

pub struct ConfigDiscovery {
    root: PathBuf,
    use_env: bool,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            use_env: true,
        }
    }

    /// Skip the environment layer (tests, embedding).
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn find(&self) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    /// Load the discovered config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<BuildConfig> {
        let path = self
            .find()
            .ok_or_else(|| ConfigError::NotFound(self.root.clone()))?;
        self.load_from(&path)
    }

    /// Load a specific config file with defaults and environment layered around it.
    ///
    /// When the file does not set `root`, the directory containing it becomes the root.
    pub fn load_from(&self, path: &Path) -> Result<BuildConfig> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }

        let mut figment = Figment::new().merge(Serialized::defaults(BuildConfig::default()));
        figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => figment.merge(Toml::file(&path)),
            Some("json") => figment.merge(Json::file(&path)),
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ));
            }
        };
        if self.use_env {
            figment = figment.merge(env_provider());
        }

        let mut config: BuildConfig = figment
            .extract()
            .map_err(|e| ConfigError::parse(Some(path.clone()), e))?;

        let dir = path.parent().unwrap_or(&self.root);
        config.root = Some(config.root_or(dir));
        debug!(config = %path.display(), "loaded configuration");
        Ok(config)
    }
}

fn env_provider() -> Env {
    let keys: Vec<&str> = ENV_KEYS.iter().map(|(env, _)| *env).collect();
    Env::prefixed("TOTE_").only(&keys).map(env_key)
}

/// Environment keys arrive lowercased; map them back to the camelCase field names.
fn env_key(key: &UncasedStr) -> Uncased<'_> {
    ENV_KEYS
        .iter()
        .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
        .map(|(_, field)| Uncased::from(*field))
        .unwrap_or_else(|| Uncased::from(key.as_str()))
}

/// Discover and load config from the current directory.
pub fn discover() -> Result<BuildConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_camel_case() {
        assert_eq!(env_key(UncasedStr::new("outputdir")).as_str(), "outputDir");
        assert_eq!(env_key(UncasedStr::new("WORKERCOUNT")).as_str(), "workerCount");
        assert_eq!(env_key(UncasedStr::new("other")).as_str(), "other");
    }
}
