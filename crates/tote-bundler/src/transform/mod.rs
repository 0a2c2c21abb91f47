//! Module transforms.
//!
//! A transform is a named predicate/function pair. The registry keeps them in
//! registration order and routes each module to the first transform whose
//! predicate matches; unmatched content passes through unchanged.
//!
//! Config-file rules (`transforms = [...]`) compile into the same closures as
//! programmatic transforms, so both kinds share one ordered list.

mod loaders;
mod scheduler;

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tote_config::TransformRule;
use tote_graph::{ContentType, ModuleId};

use crate::Result;

pub use loaders::{css_loader, json_loader, text_loader};
pub use scheduler::{TransformJob, TransformScheduler, TransformedModule};

pub type TransformPredicate = Arc<dyn Fn(&ModuleId) -> bool + Send + Sync>;
pub type TransformFn =
    Arc<dyn Fn(&TransformContext<'_>, Vec<u8>) -> anyhow::Result<TransformOutput> + Send + Sync>;

/// What a transform sees besides the content itself.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub id: &'a ModuleId,
    pub content_type: ContentType,
}

/// Transformed bytes, optionally reclassified (e.g. text exported as JSON).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub content: Vec<u8>,
    pub content_type: Option<ContentType>,
}

impl TransformOutput {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

impl From<Vec<u8>> for TransformOutput {
    fn from(content: Vec<u8>) -> Self {
        Self::new(content)
    }
}

impl From<String> for TransformOutput {
    fn from(content: String) -> Self {
        Self::new(content.into_bytes())
    }
}

#[derive(Clone)]
pub struct Transform {
    name: String,
    predicate: TransformPredicate,
    apply: TransformFn,
}

impl Transform {
    pub fn new<P, F>(name: impl Into<String>, predicate: P, apply: F) -> Self
    where
        P: Fn(&ModuleId) -> bool + Send + Sync + 'static,
        F: Fn(&TransformContext<'_>, Vec<u8>) -> anyhow::Result<TransformOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            apply: Arc::new(apply),
        }
    }

    /// Transform applied to modules whose path matches `test`.
    pub fn matching<F>(name: impl Into<String>, test: Regex, apply: F) -> Self
    where
        F: Fn(&TransformContext<'_>, Vec<u8>) -> anyhow::Result<TransformOutput> + Send + Sync + 'static,
    {
        Self::new(name, move |id: &ModuleId| test.is_match(&id.path_string()), apply)
    }

    /// Compile a config-file rule into a transform backed by a built-in loader.
    pub fn from_rule(rule: &TransformRule) -> Result<Self> {
        let test = compile(&rule.test)?;
        let include = rule.include.iter().map(|p| compile(p)).collect::<Result<Vec<_>>>()?;
        let exclude = rule.exclude.iter().map(|p| compile(p)).collect::<Result<Vec<_>>>()?;

        let predicate = move |id: &ModuleId| {
            let path = id.path_string();
            test.is_match(&path)
                && (include.is_empty() || include.iter().any(|re| re.is_match(&path)))
                && !exclude.iter().any(|re| re.is_match(&path))
        };

        Ok(match rule.loader {
            tote_config::LoaderKind::Css => Self::new("css", predicate, css_loader),
            tote_config::LoaderKind::Json => Self::new("json", predicate, json_loader),
            tote_config::LoaderKind::Text => Self::new("text", predicate, text_loader),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, id: &ModuleId) -> bool {
        (self.predicate)(id)
    }

    pub fn apply(&self, cx: &TransformContext<'_>, content: Vec<u8>) -> anyhow::Result<TransformOutput> {
        (self.apply)(cx, content)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish_non_exhaustive()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        tote_config::ConfigError::InvalidPattern {
            field: "transforms".to_string(),
            pattern: pattern.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Ordered transform list; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: Vec<Transform>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the config-file rules, in file order.
    pub fn from_rules(rules: &[TransformRule]) -> Result<Self> {
        let transforms = rules.iter().map(Transform::from_rule).collect::<Result<Vec<_>>>()?;
        Ok(Self { transforms })
    }

    pub fn push(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    pub fn find(&self, id: &ModuleId) -> Option<&Transform> {
        self.transforms.iter().find(|t| t.matches(id))
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}
