//! Pluggable config validation strategies
//!
//! Schema validation checks the configuration on its own; filesystem
//! validation additionally checks that referenced files exist.

use std::path::{Path, PathBuf};

use regex::Regex;
use rustc_hash::FxHashSet;
use tote_graph::ContentType;

use crate::config::{BuildConfig, EmitStage};
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        if config.entry.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        let mut chunk_names = FxHashSet::default();
        for (name, value) in &config.entry {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "entry".to_string(),
                    hint: "entry names cannot be empty".to_string(),
                });
            }
            let specifiers = value.specifiers();
            if specifiers.is_empty() || specifiers.iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::EmptyEntry(name.clone()));
            }
            chunk_names.insert(name.as_str());
        }

        for (index, rule) in config.transforms.iter().enumerate() {
            let field = format!("transforms[{index}]");
            check_pattern(&format!("{field}.test"), &rule.test)?;
            for pattern in rule.include.iter().chain(&rule.exclude) {
                check_pattern(&field, pattern)?;
            }
        }

        for (index, external) in config.externals.iter().enumerate() {
            if external.library_name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("externals[{index}].libraryName"),
                    hint: "library names cannot be empty".to_string(),
                });
            }
            if external.manifest_path.is_none() && external.global_binding_name.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("externals[{index}]"),
                    hint: format!(
                        "'{}' needs either a manifestPath or a globalBindingName",
                        external.library_name
                    ),
                });
            }
        }

        if !config.duplicate_shared_modules && !chunk_names.insert(config.shared_chunk_name.as_str()) {
            return Err(ConfigError::DuplicateChunkName(config.shared_chunk_name.clone()));
        }

        for (index, rule) in config.chunk_grouping_rules.iter().enumerate() {
            if rule.test.is_none() && rule.content_type.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("chunkGroupingRules[{index}]"),
                    hint: "set a test pattern, a contentType, or both".to_string(),
                });
            }
            if let Some(test) = &rule.test {
                check_pattern(&format!("chunkGroupingRules[{index}].test"), test)?;
            }
            if !chunk_names.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateChunkName(rule.name.clone()));
            }
        }

        for (index, stage) in config.emit_stages.iter().enumerate() {
            if let EmitStage::ExtractByType { content_type, .. } = stage
                && *content_type != ContentType::Stylesheet
            {
                return Err(ConfigError::InvalidValue {
                    field: format!("emitStages[{index}].extractByType.contentType"),
                    hint: format!("only stylesheet content can be extracted, not {content_type}"),
                });
            }
            if let EmitStage::Compress { threshold, test } = stage {
                if *threshold == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: format!("emitStages[{index}].compress.threshold"),
                        hint: "threshold must be at least 1 byte".to_string(),
                    });
                }
                if let Some(test) = test {
                    check_pattern(&format!("emitStages[{index}].compress.test"), test)?;
                }
            }
        }

        if config.worker_count == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "workerCount".to_string(),
                hint: "use at least one worker".to_string(),
            });
        }

        if config.transform_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transformTimeoutMs".to_string(),
                hint: "the per-job timeout must be positive".to_string(),
            });
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use)
///
/// Runs schema validation, then checks that relative entry files and
/// external manifests exist under the root.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let root = config.root_or(&self.root);
        for value in config.entry.values() {
            for specifier in value.specifiers() {
                // Bare specifiers go through module directories; only paths are checked here.
                if !(specifier.starts_with('.') || specifier.starts_with('/')) {
                    continue;
                }
                let without_query = specifier.split('?').next().unwrap_or(specifier);
                let path = root.join(without_query);
                if !path.exists() && !has_probed_match(&root, without_query, &config.resolve.extensions) {
                    return Err(ConfigError::EntryNotFound(path));
                }
            }
        }

        for external in &config.externals {
            if let Some(manifest) = &external.manifest_path {
                let path = root.join(manifest);
                if !path.is_file() {
                    return Err(ConfigError::ManifestNotFound(path));
                }
            }
        }

        Ok(())
    }
}

fn has_probed_match(root: &Path, specifier: &str, extensions: &[String]) -> bool {
    extensions
        .iter()
        .any(|ext| root.join(format!("{specifier}{ext}")).is_file())
}

fn check_pattern(field: &str, pattern: &str) -> Result<()> {
    Regex::new(pattern).map(|_| ()).map_err(|e| ConfigError::InvalidPattern {
        field: field.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Validate with schema rules only.
pub fn validate_schema(config: &BuildConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Validate with schema rules and filesystem checks relative to `root`.
pub fn validate_fs(config: &BuildConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
