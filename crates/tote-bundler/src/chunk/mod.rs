//! Chunks: named module sets emitted together.

mod splitter;

use serde::Serialize;
use tote_graph::ModuleId;

pub use splitter::{ChunkSplitter, GroupPredicate, GroupRule, SplitOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkKind {
    /// One per configured entry; runs its entry modules.
    Entry,
    /// Modules reached from more than one entry and claimed by no group.
    SharedVendor,
    /// Modules claimed by a grouping rule.
    Grouped,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::SharedVendor => "shared",
            Self::Grouped => "group",
        }
    }
}

/// A chunk as handed to the emitter. Immutable once split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Members in canonical graph order.
    pub modules: Vec<ModuleId>,
    /// Modules an entry chunk runs, in entry declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry_modules: Vec<ModuleId>,
    /// Chunks that must be loaded before this one runs, in chunk order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

impl Chunk {
    pub fn new(name: impl Into<String>, kind: ChunkKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modules: Vec::new(),
            entry_modules: Vec::new(),
            requires: Vec::new(),
        }
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn is_entry(&self) -> bool {
        self.kind == ChunkKind::Entry
    }
}
