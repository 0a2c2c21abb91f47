use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ExternalSlot, ModuleId};

/// Coarse content classification used by transforms, grouping rules and
/// the extraction stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Script,
    Stylesheet,
    Json,
    Asset,
}

impl ContentType {
    /// Derive the content type from a file extension string.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => Self::Script,
            "css" => Self::Stylesheet,
            "json" => Self::Json,
            _ => Self::Asset,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Asset, Self::from_extension)
    }

    /// Extension used for files holding only this kind of content.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::Script => "js",
            Self::Stylesheet => "css",
            Self::Json => "json",
            Self::Asset => "txt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::Json => "json",
            Self::Asset => "asset",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "script" | "js" => Ok(Self::Script),
            "stylesheet" | "css" => Ok(Self::Stylesheet),
            "json" => Ok(Self::Json),
            "asset" => Ok(Self::Asset),
            other => Err(format!(
                "unknown content type '{other}' (expected script, stylesheet, json or asset)"
            )),
        }
    }
}

/// Whether a dependency edge lands on local source or on an external slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Source,
    External,
}

/// Outcome of resolving one import specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum ResolvedTarget {
    Module(ModuleId),
    External(ExternalSlot),
}

impl ResolvedTarget {
    pub fn kind(&self) -> ModuleKind {
        match self {
            Self::Module(_) => ModuleKind::Source,
            Self::External(_) => ModuleKind::External,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleId> {
        match self {
            Self::Module(id) => Some(id),
            Self::External(_) => None,
        }
    }

    pub fn as_external(&self) -> Option<&ExternalSlot> {
        match self {
            Self::Module(_) => None,
            Self::External(slot) => Some(slot),
        }
    }
}

/// One import edge, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub specifier: String,
    pub target: ResolvedTarget,
}

impl Dependency {
    pub fn new(specifier: impl Into<String>, target: ResolvedTarget) -> Self {
        Self {
            specifier: specifier.into(),
            target,
        }
    }
}

/// A module as it exists in the finished graph.
///
/// Records are assembled once, after the module's transform completed and
/// all of its specifiers resolved, and are immutable afterwards. Content is
/// kept behind `Arc` so records clone cheaply out of the module table.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    id: ModuleId,
    content_type: ContentType,
    raw: Arc<[u8]>,
    transformed: Option<Arc<[u8]>>,
    transform: Option<String>,
    dependencies: Vec<Dependency>,
}

impl ModuleRecord {
    pub fn builder(id: ModuleId, raw: impl Into<Arc<[u8]>>) -> ModuleRecordBuilder {
        let content_type = ContentType::from_path(id.as_path());
        ModuleRecordBuilder {
            record: Self {
                id,
                content_type,
                raw: raw.into(),
                transformed: None,
                transform: None,
                dependencies: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn raw_content(&self) -> &[u8] {
        &self.raw
    }

    /// Transformed bytes, or `None` when no transform matched the module.
    pub fn transformed_content(&self) -> Option<&[u8]> {
        self.transformed.as_deref()
    }

    /// The bytes that go into the output: transformed if a transform ran.
    pub fn content(&self) -> &[u8] {
        self.transformed.as_deref().unwrap_or(&self.raw)
    }

    /// Name of the transform that produced `transformed_content`.
    pub fn transform_name(&self) -> Option<&str> {
        self.transform.as_deref()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Local module targets in source order, duplicates removed.
    pub fn local_dependencies(&self) -> impl Iterator<Item = &ModuleId> {
        let mut seen = rustc_hash::FxHashSet::default();
        self.dependencies
            .iter()
            .filter_map(|dep| dep.target.as_module())
            .filter(move |id| seen.insert(*id))
    }

    pub fn external_dependencies(&self) -> impl Iterator<Item = &ExternalSlot> {
        self.dependencies
            .iter()
            .filter_map(|dep| dep.target.as_external())
    }
}

pub struct ModuleRecordBuilder {
    record: ModuleRecord,
}

impl ModuleRecordBuilder {
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.record.content_type = content_type;
        self
    }

    pub fn transformed(mut self, transform: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        self.record.transform = Some(transform.into());
        self.record.transformed = Some(content.into());
        self
    }

    pub fn dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.record.dependencies = dependencies;
        self
    }

    pub fn build(self) -> ModuleRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str) -> ModuleId {
        ModuleId::new(path).unwrap()
    }

    #[test]
    fn content_type_from_path() {
        assert_eq!(ContentType::from_path(Path::new("a.tsx")), ContentType::Script);
        assert_eq!(ContentType::from_path(Path::new("a.css")), ContentType::Stylesheet);
        assert_eq!(ContentType::from_path(Path::new("a.json")), ContentType::Json);
        assert_eq!(ContentType::from_path(Path::new("a.png")), ContentType::Asset);
        assert_eq!(ContentType::from_path(Path::new("Makefile")), ContentType::Asset);
    }

    #[test]
    fn content_type_parses_aliases() {
        assert_eq!("css".parse::<ContentType>().unwrap(), ContentType::Stylesheet);
        assert_eq!("Script".parse::<ContentType>().unwrap(), ContentType::Script);
        assert!("video".parse::<ContentType>().is_err());
    }

    #[test]
    fn content_prefers_transformed_bytes() {
        let record = ModuleRecord::builder(id("/p/a.css"), b"a { }".to_vec())
            .transformed("css", b"a{}".to_vec())
            .build();
        assert_eq!(record.content(), b"a{}");
        assert_eq!(record.raw_content(), b"a { }");
        assert_eq!(record.transform_name(), Some("css"));

        let untouched = ModuleRecord::builder(id("/p/b.js"), b"1".to_vec()).build();
        assert_eq!(untouched.content(), b"1");
        assert!(untouched.transformed_content().is_none());
    }

    #[test]
    fn local_dependencies_are_deduplicated() {
        let b = id("/p/b.js");
        let record = ModuleRecord::builder(id("/p/a.js"), Vec::new())
            .dependencies(vec![
                Dependency::new("./b", ResolvedTarget::Module(b.clone())),
                Dependency::new("react", ResolvedTarget::External(ExternalSlot::global("react", "React"))),
                Dependency::new("./b.js", ResolvedTarget::Module(b.clone())),
            ])
            .build();

        let locals: Vec<_> = record.local_dependencies().collect();
        assert_eq!(locals, vec![&b]);
        assert_eq!(record.external_dependencies().count(), 1);
        assert_eq!(record.dependencies()[1].target.kind(), ModuleKind::External);
    }
}
