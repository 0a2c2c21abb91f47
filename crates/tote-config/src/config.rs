//! The explicit build configuration.
//!
//! Every recognised option is a field here; unknown keys are rejected when
//! the configuration is deserialized.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tote_graph::ContentType;

use crate::error::{ConfigError, Result};
use crate::template::FilenameTemplate;

pub const DEFAULT_OUTPUT_DIR: &str = "dist";
pub const DEFAULT_FILENAME_PATTERN: &str = "[name].js";
pub const DEFAULT_SHARED_CHUNK_NAME: &str = "shared";
pub const DEFAULT_TRANSFORM_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LIBRARY_BINDING: &str = "[name]_dll_[hash]";
pub const DEFAULT_LIBRARY_MANIFEST: &str = "[name].manifest.json";
pub const DEFAULT_COMPRESS_TEST: &str = r"\.(js|css)$";

/// Extension probing order used when `resolve.extensions` is not set.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".jsx", ".ts", ".tsx", ".json", ".css"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfig {
    /// Chunk name → entry specifier(s), in declaration order.
    #[serde(default)]
    pub entry: IndexMap<String, EntryValue>,

    /// Project root. Relative entries and paths resolve against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_filename_pattern")]
    pub output_filename_pattern: FilenameTemplate,

    #[serde(default)]
    pub resolve: ResolveConfig,

    #[serde(default)]
    pub transforms: Vec<TransformRule>,

    #[serde(default)]
    pub externals: Vec<ExternalConfig>,

    #[serde(default)]
    pub chunk_grouping_rules: Vec<GroupingRule>,

    /// Chunk receiving ungrouped modules reachable from several entries.
    #[serde(default = "default_shared_chunk_name")]
    pub shared_chunk_name: String,

    /// Copy shared modules into every entry chunk instead of splitting them out.
    #[serde(default)]
    pub duplicate_shared_modules: bool,

    #[serde(default)]
    pub emit_stages: Vec<EmitStage>,

    /// Transform worker count. Defaults to available CPUs minus one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,

    #[serde(default = "default_transform_timeout_ms")]
    pub transform_timeout_ms: u64,

    #[serde(default)]
    pub library: LibraryConfig,

    /// Log every import cycle as a warning once the graph is built.
    #[serde(default)]
    pub warn_on_cycles: bool,

    /// Remove the output directory before writing.
    #[serde(default)]
    pub clean: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entry: IndexMap::new(),
            root: None,
            output_dir: default_output_dir(),
            output_filename_pattern: default_filename_pattern(),
            resolve: ResolveConfig::default(),
            transforms: Vec::new(),
            externals: Vec::new(),
            chunk_grouping_rules: Vec::new(),
            shared_chunk_name: default_shared_chunk_name(),
            duplicate_shared_modules: false,
            emit_stages: Vec::new(),
            worker_count: None,
            transform_timeout_ms: default_transform_timeout_ms(),
            library: LibraryConfig::default(),
            warn_on_cycles: false,
            clean: false,
        }
    }
}

impl BuildConfig {
    /// Config with a single named entry.
    pub fn new(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.entry.insert(name.into(), EntryValue::One(specifier.into()));
        config
    }

    /// Create from a `serde_json::Value` (programmatic configuration).
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::parse(None, e))
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| ConfigError::parse(None, e))
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: e.to_string(),
        })
    }

    /// Add or replace an entry.
    pub fn with_entry(mut self, name: impl Into<String>, value: impl Into<EntryValue>) -> Self {
        self.entry.insert(name.into(), value.into());
        self
    }

    /// Root to resolve against, falling back to `cwd`.
    pub fn root_or(&self, cwd: &Path) -> PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => cwd.join(root),
            None => cwd.to_path_buf(),
        }
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_millis(self.transform_timeout_ms)
    }

    /// Names of all entry chunks, in declaration order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entry.keys().map(String::as_str)
    }
}

/// One specifier or an ordered list of specifiers for a single entry chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryValue {
    One(String),
    Many(Vec<String>),
}

impl EntryValue {
    pub fn specifiers(&self) -> Vec<&str> {
        match self {
            Self::One(spec) => vec![spec.as_str()],
            Self::Many(specs) => specs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for EntryValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for EntryValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<&str>> for EntryValue {
    fn from(value: Vec<&str>) -> Self {
        Self::Many(value.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResolveConfig {
    /// Extensions probed, in order, when a specifier has no file on disk.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Specifier prefix → replacement path (relative to the root).
    #[serde(default)]
    pub alias: IndexMap<String, PathBuf>,

    /// Directories searched, in order, for bare specifiers.
    #[serde(default = "default_modules")]
    pub modules: Vec<PathBuf>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            alias: IndexMap::new(),
            modules: default_modules(),
        }
    }
}

/// Built-in loaders a config file can route modules to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// Parse and re-print stylesheets; rejects malformed CSS.
    Css,
    /// Validate JSON and normalise it.
    Json,
    /// Export the file's text as a string module.
    Text,
}

impl LoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransformRule {
    /// Regex matched against the module path.
    pub test: String,
    pub loader: LoaderKind,
    /// When non-empty, the module path must match one of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalConfig {
    pub library_name: String,
    /// Link-library manifest written by a previous library build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
    /// Required for plain globals; overrides nothing for linked libraries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_binding_name: Option<String>,
}

impl ExternalConfig {
    pub fn linked(library_name: impl Into<String>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            library_name: library_name.into(),
            manifest_path: Some(manifest_path.into()),
            global_binding_name: None,
        }
    }

    pub fn global(library_name: impl Into<String>, binding: impl Into<String>) -> Self {
        Self {
            library_name: library_name.into(),
            manifest_path: None,
            global_binding_name: Some(binding.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupingRule {
    /// Target chunk name.
    pub name: String,
    /// Regex matched against the module path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
}

impl GroupingRule {
    pub fn by_content_type(name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            name: name.into(),
            test: None,
            content_type: Some(content_type),
        }
    }

    pub fn by_pattern(name: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test: Some(test.into()),
            content_type: None,
        }
    }
}

/// One stage of the emit pipeline, applied in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", deny_unknown_fields)]
pub enum EmitStage {
    Minify,
    ExtractByType {
        content_type: ContentType,
        /// Sibling filename template; defaults to `[name].<ext>`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<FilenameTemplate>,
    },
    Compress {
        /// Minimum artifact size in bytes for compression to run.
        threshold: u64,
        /// Regex an artifact filename must match.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        test: Option<String>,
    },
}

impl EmitStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minify => "minify",
            Self::ExtractByType { .. } => "extractByType",
            Self::Compress { .. } => "compress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LibraryConfig {
    /// Global the library artifact registers itself under.
    #[serde(default = "default_library_binding")]
    pub binding_name: FilenameTemplate,
    #[serde(default = "default_library_manifest")]
    pub manifest_filename: FilenameTemplate,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            binding_name: default_library_binding(),
            manifest_filename: default_library_manifest(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_filename_pattern() -> FilenameTemplate {
    FilenameTemplate::builtin(DEFAULT_FILENAME_PATTERN)
}

fn default_shared_chunk_name() -> String {
    DEFAULT_SHARED_CHUNK_NAME.to_string()
}

fn default_transform_timeout_ms() -> u64 {
    DEFAULT_TRANSFORM_TIMEOUT_MS
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_modules() -> Vec<PathBuf> {
    vec![PathBuf::from("node_modules")]
}

fn default_library_binding() -> FilenameTemplate {
    FilenameTemplate::builtin(DEFAULT_LIBRARY_BINDING)
}

fn default_library_manifest() -> FilenameTemplate {
    FilenameTemplate::builtin(DEFAULT_LIBRARY_MANIFEST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = BuildConfig::from_value(json!({ "entry": { "main": "./a.js" } })).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("dist"));
        assert_eq!(config.output_filename_pattern.as_str(), "[name].js");
        assert_eq!(config.shared_chunk_name, "shared");
        assert_eq!(config.transform_timeout(), Duration::from_secs(30));
        assert_eq!(config.resolve.extensions[0], ".js");
        assert!(config.emit_stages.is_empty());
    }

    #[test]
    fn entry_accepts_string_or_list() {
        let config = BuildConfig::from_value(json!({
            "entry": { "main": "./main.js", "react": ["react", "react-dom"] }
        }))
        .unwrap();
        assert_eq!(config.entry["main"].specifiers(), vec!["./main.js"]);
        assert_eq!(config.entry["react"].specifiers(), vec!["react", "react-dom"]);
        assert_eq!(config.entry_names().collect::<Vec<_>>(), vec!["main", "react"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BuildConfig::from_value(json!({ "entry": {}, "mode": "production" })).unwrap_err();
        assert!(err.to_string().contains("mode"), "{err}");

        let err = BuildConfig::from_value(json!({
            "entry": {},
            "externals": [{ "libraryName": "vue", "global": "Vue" }]
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn emit_stages_parse_in_order() {
        let config = BuildConfig::from_value(json!({
            "entry": { "main": "./a.js" },
            "emitStages": [
                "minify",
                { "extractByType": { "contentType": "stylesheet" } },
                { "compress": { "threshold": 1024 } }
            ]
        }))
        .unwrap();

        assert_eq!(
            config.emit_stages,
            vec![
                EmitStage::Minify,
                EmitStage::ExtractByType { content_type: ContentType::Stylesheet, filename: None },
                EmitStage::Compress { threshold: 1024, test: None },
            ]
        );
    }

    #[test]
    fn toml_config_parses() {
        let config = BuildConfig::from_toml_str(
            r#"
outputDir = "build"
outputFilenamePattern = "[name].bundle.js"
workerCount = 3

[entry]
main = "./main.js"

[[chunkGroupingRules]]
name = "styles"
contentType = "stylesheet"

[[transforms]]
test = '\.css$'
loader = "css"
exclude = ["vendor"]
"#,
        )
        .unwrap();

        assert_eq!(config.worker_count, Some(3));
        assert_eq!(config.chunk_grouping_rules[0], GroupingRule::by_content_type("styles", ContentType::Stylesheet));
        assert_eq!(config.transforms[0].loader, LoaderKind::Css);
        assert_eq!(config.transforms[0].exclude, vec!["vendor"]);
    }

    #[test]
    fn invalid_template_fails_deserialization() {
        let err = BuildConfig::from_value(json!({
            "entry": { "main": "./a.js" },
            "outputFilenamePattern": "[chunk].js"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown placeholder"), "{err}");
    }

    #[test]
    fn root_resolution() {
        let cwd = Path::new("/work");
        let mut config = BuildConfig::new("main", "./a.js");
        assert_eq!(config.root_or(cwd), PathBuf::from("/work"));
        config.root = Some(PathBuf::from("app"));
        assert_eq!(config.root_or(cwd), PathBuf::from("/work/app"));
    }
}
