use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use tote_config::{BuildConfig, GroupingRule};
use tote_graph::{ContentType, ModuleGraph, ModuleId, ModuleRecord};
use tracing::debug;

use super::{Chunk, ChunkKind};
use crate::Result;

pub type GroupPredicate = Arc<dyn Fn(&ModuleRecord) -> bool + Send + Sync>;

/// Sends every module its predicate accepts to the chunk `name`.
#[derive(Clone)]
pub struct GroupRule {
    name: String,
    predicate: GroupPredicate,
}

impl GroupRule {
    pub fn new<P>(name: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&ModuleRecord) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn by_content_type(name: impl Into<String>, content_type: ContentType) -> Self {
        Self::new(name, move |record: &ModuleRecord| record.content_type() == content_type)
    }

    /// Compile a config rule; when both a pattern and a content type are
    /// given, both must match.
    pub fn from_config(rule: &GroupingRule) -> Result<Self> {
        let test = rule
            .test
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| tote_config::ConfigError::InvalidPattern {
                    field: format!("chunkGroupingRules.{}", rule.name),
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;
        let content_type = rule.content_type;

        Ok(Self::new(rule.name.clone(), move |record: &ModuleRecord| {
            content_type.is_none_or(|ct| record.content_type() == ct)
                && test
                    .as_ref()
                    .is_none_or(|re| re.is_match(&record.id().path_string()))
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, record: &ModuleRecord) -> bool {
        (self.predicate)(record)
    }
}

impl fmt::Debug for GroupRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRule").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Knobs for multi-entry modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    pub shared_chunk_name: String,
    /// Copy multi-entry modules into each consuming entry chunk.
    pub duplicate_shared: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            shared_chunk_name: tote_config::DEFAULT_SHARED_CHUNK_NAME.to_string(),
            duplicate_shared: false,
        }
    }
}

/// Partitions a finished graph into chunks.
///
/// Placement of each module, first match wins:
///
/// 1. the first grouping rule (in registration order) accepting it
/// 2. the entry chunk of the single entry reaching it
/// 3. the shared chunk, or every reaching entry chunk when duplicating
///
/// The result depends only on the graph and the rules: modules are visited
/// in canonical graph order and chunks are ordered entries first (config
/// order), then the shared chunk, then groups (rule order). Empty shared and
/// group chunks are dropped.
#[derive(Debug, Clone, Default)]
pub struct ChunkSplitter {
    rules: Vec<GroupRule>,
    options: SplitOptions,
}

impl ChunkSplitter {
    /// Splitter with no grouping rules.
    pub fn new(options: SplitOptions) -> Self {
        Self {
            rules: Vec::new(),
            options,
        }
    }

    /// Splitter with the config's grouping rules (in file order) and
    /// shared-chunk options. Fails on an invalid rule pattern.
    pub fn from_config(config: &BuildConfig) -> Result<Self> {
        let rules = config
            .chunk_grouping_rules
            .iter()
            .map(GroupRule::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            options: SplitOptions {
                shared_chunk_name: config.shared_chunk_name.clone(),
                duplicate_shared: config.duplicate_shared_modules,
            },
        })
    }

    /// Self-contained chunks per entry: no groups, nothing shared.
    pub fn library() -> Self {
        Self::new(SplitOptions {
            duplicate_shared: true,
            ..SplitOptions::default()
        })
    }

    /// Append a grouping rule. Rules are tried in the order they were added,
    /// so this one only sees modules every earlier rule declined.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tote_bundler::{ChunkSplitter, ContentType, GroupRule, SplitOptions};
    ///
    /// let splitter = ChunkSplitter::new(SplitOptions::default())
    ///     .rule(GroupRule::by_content_type("styles", ContentType::Stylesheet))
    ///     .rule(GroupRule::new("vendor", |record: &tote_bundler::ModuleRecord| {
    ///         record.id().path_string().contains("/node_modules/")
    ///     }));
    ///
    /// let names: Vec<_> = splitter.rules().iter().map(|rule| rule.name()).collect();
    /// assert_eq!(names, ["styles", "vendor"]);
    /// ```
    pub fn rule(mut self, rule: GroupRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[GroupRule] {
        &self.rules
    }

    /// Partition `graph`. Running this twice on the same graph yields the
    /// same chunks in the same order.
    pub fn split(&self, graph: &ModuleGraph) -> Vec<Chunk> {
        let entries = graph.entries();

        // Which entries reach each module, keyed in canonical order.
        let reach: Vec<IndexSet<ModuleId>> = entries
            .values()
            .map(|ids| graph.reachable_from(&ids.iter().collect::<Vec<_>>()))
            .collect();

        let mut entry_chunks: Vec<Chunk> = entries
            .iter()
            .map(|(name, ids)| {
                let mut chunk = Chunk::new(name, ChunkKind::Entry);
                chunk.entry_modules = ids.clone();
                chunk
            })
            .collect();
        let mut shared = Chunk::new(&self.options.shared_chunk_name, ChunkKind::SharedVendor);
        let mut groups: IndexMap<&str, Chunk> = self
            .rules
            .iter()
            .map(|rule| (rule.name(), Chunk::new(rule.name(), ChunkKind::Grouped)))
            .collect();

        for record in graph.modules() {
            let id = record.id();
            let owners: Vec<usize> = reach
                .iter()
                .enumerate()
                .filter(|(_, reached)| reached.contains(id))
                .map(|(index, _)| index)
                .collect();
            if owners.is_empty() {
                continue;
            }

            if let Some(rule) = self.rules.iter().find(|rule| rule.matches(record)) {
                if let Some(group) = groups.get_mut(rule.name()) {
                    group.modules.push(id.clone());
                }
            } else if owners.len() == 1 || self.options.duplicate_shared {
                for owner in owners {
                    entry_chunks[owner].modules.push(id.clone());
                }
            } else {
                shared.modules.push(id.clone());
            }
        }

        let mut chunks = entry_chunks;
        if !shared.is_empty() {
            chunks.push(shared);
        }
        chunks.extend(groups.into_values().filter(|group| !group.is_empty()));

        let entry_count = entries.len();
        let requires: Vec<Vec<String>> = (0..entry_count)
            .map(|index| {
                chunks[entry_count..]
                    .iter()
                    .filter(|chunk| chunk.modules.iter().any(|id| reach[index].contains(id)))
                    .map(|chunk| chunk.name.clone())
                    .collect()
            })
            .collect();
        for (chunk, requires) in chunks.iter_mut().zip(requires) {
            chunk.requires = requires;
        }

        for chunk in &chunks {
            debug!(
                chunk = %chunk.name,
                kind = chunk.kind.as_str(),
                modules = chunk.len(),
                "chunk assigned"
            );
        }
        chunks
    }
}
