//! Config loading shared by every command.

use std::path::Path;

use tote_config::{BuildConfig, ConfigDiscovery, EntryValue};
use tracing::debug;

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};

/// Load the layered configuration for `cwd`.
///
/// An explicit `--config` wins, then a discovered config file. Entries given
/// on the command line replace the file's entries; with no file at all they
/// form the whole configuration.
pub(crate) fn load_config(
    args: &ConfigArgs,
    entries: &[(String, String)],
    cwd: &Path,
) -> Result<BuildConfig> {
    let discovery = ConfigDiscovery::new(cwd);
    let mut config = match (&args.config, discovery.find()) {
        (Some(path), _) => discovery.load_from(path)?,
        (None, Some(path)) => discovery.load_from(&path)?,
        (None, None) if !entries.is_empty() => {
            debug!("no config file, using command-line entries");
            BuildConfig {
                root: Some(cwd.to_path_buf()),
                ..BuildConfig::default()
            }
        }
        (None, None) => return Err(CliError::NoConfig(cwd.to_path_buf())),
    };

    if !entries.is_empty() {
        config.entry.clear();
        for (name, specifier) in entries {
            config
                .entry
                .insert(name.clone(), EntryValue::from(specifier.as_str()));
        }
    }
    Ok(config)
}

pub(crate) fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}
