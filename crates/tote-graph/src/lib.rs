//! # tote-graph
//!
//! Data model shared by every stage of a tote build:
//!
//! - [`ModuleId`]: canonical, deduplicating module identity (path + query)
//! - [`ModuleRecord`]: a module's raw and transformed bytes plus its resolved edges
//! - [`ExternalSlot`]: a dependency satisfied by a prebuilt library or runtime global
//! - [`ModuleTable`]: the claim-once table producers insert into while the graph is built
//! - [`ModuleGraph`]: the frozen, fully resolved graph handed to chunk splitting
//! - [`runtime::Runtime`]: filesystem abstraction used for resolution and loading
//!
//! No I/O happens here apart from the native runtime implementation.

pub mod runtime;

mod external;
mod graph;
mod module;
mod module_id;
mod table;

pub use external::ExternalSlot;
pub use graph::ModuleGraph;
pub use module::{ContentType, Dependency, ModuleKind, ModuleRecord, ModuleRecordBuilder, ResolvedTarget};
pub use module_id::{ModuleId, ModuleIdError, canonical_path};
pub use runtime::{Runtime, RuntimeError, RuntimeResult};
pub use table::ModuleTable;

#[cfg(not(target_family = "wasm"))]
pub use runtime::native::NativeRuntime;

/// Violations of the graph model's structural invariants.
#[derive(Debug, thiserror::Error)]
pub enum GraphModelError {
    #[error("module '{0}' was completed without being claimed")]
    NotClaimed(ModuleId),

    #[error("module '{0}' was completed twice")]
    AlreadyCompleted(ModuleId),

    #[error("module '{0}' is still resolving")]
    StillResolving(ModuleId),

    #[error("module '{0}' failed and cannot be part of the graph")]
    FailedModule(ModuleId),

    #[error("entry '{entry}' points at unknown module '{module}'")]
    UnknownEntry { entry: String, module: ModuleId },

    #[error("module '{from}' depends on '{to}', which has no record")]
    DanglingDependency { from: ModuleId, to: ModuleId },
}
