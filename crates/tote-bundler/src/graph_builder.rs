//! Module graph construction.
//!
//! The coordinator runs on the calling task: it resolves specifiers, claims
//! newly discovered ids in the [`ModuleTable`] and hands each claimed id to
//! the [`TransformScheduler`]. It only suspends while waiting for the next
//! finished job, whichever finishes first. Losing a claim means the module
//! is already owned by another job; the loser just records the edge.
//!
//! Per-module failures are collected and the traversal continues, so one
//! build reports every unresolved specifier and failed transform at once.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tokio::task::{self, JoinSet};
use tote_graph::{Dependency, ModuleGraph, ModuleId, ModuleTable, ResolvedTarget};
use tracing::{info, warn};

use crate::resolver::ModuleResolver;
use crate::transform::{TransformJob, TransformScheduler, TransformedModule};
use crate::{Error, GraphError, Result};

type JobResult = (ModuleId, Result<TransformedModule>);

/// Spawned jobs and the module each one owns, so a job that dies can still
/// be reported against its module.
#[derive(Default)]
struct Jobs {
    set: JoinSet<JobResult>,
    owners: FxHashMap<task::Id, ModuleId>,
}

/// Drives resolution and transformation from the entries outward until
/// every reachable module has a record.
///
/// The builder owns no state between builds; call [`build`](Self::build)
/// again for a fresh traversal (transform dedup is per scheduler).
#[derive(Debug)]
pub struct DependencyGraphBuilder {
    resolver: Arc<ModuleResolver>,
    scheduler: Arc<TransformScheduler>,
    warn_on_cycles: bool,
}

impl DependencyGraphBuilder {
    /// Create a builder.
    ///
    /// # Arguments
    ///
    /// * `resolver` - Resolves entry specifiers and every scanned import
    /// * `scheduler` - Loads, transforms and scans each claimed module once
    pub fn new(resolver: Arc<ModuleResolver>, scheduler: Arc<TransformScheduler>) -> Self {
        Self {
            resolver,
            scheduler,
            warn_on_cycles: false,
        }
    }

    /// Log each import cycle once the graph is complete.
    pub fn warn_on_cycles(mut self, enabled: bool) -> Self {
        self.warn_on_cycles = enabled;
        self
    }

    /// Build the graph reachable from `entries` (chunk name → specifiers).
    ///
    /// # Errors
    ///
    /// [`Error::Graph`] carrying every resolution, load, syntax and transform
    /// failure found, in the order they surfaced.
    pub async fn build(&self, entries: &IndexMap<String, Vec<String>>) -> Result<ModuleGraph> {
        let table = ModuleTable::new();
        let mut errors = Vec::new();
        let mut jobs = Jobs::default();

        let mut entry_ids = IndexMap::with_capacity(entries.len());
        for (name, specifiers) in entries {
            let mut ids = Vec::with_capacity(specifiers.len());
            for specifier in specifiers {
                match self.resolver.resolve(specifier, None) {
                    Ok(ResolvedTarget::Module(id)) => {
                        self.claim(&table, &mut jobs, &id);
                        ids.push(id);
                    }
                    Ok(ResolvedTarget::External(slot)) => errors.push(Error::resolution(
                        specifier.as_str(),
                        None,
                        format!("entry '{name}' resolves to external library '{}'", slot.library_name),
                    )),
                    Err(e) => errors.push(e),
                }
            }
            entry_ids.insert(name.clone(), ids);
        }

        while let Some(joined) = jobs.set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((task_id, result)) => {
                    jobs.owners.remove(&task_id);
                    result
                }
                Err(join_error) => {
                    if let Some(id) = jobs.owners.remove(&join_error.id()) {
                        table.fail(&id);
                        errors.push(Error::Transform {
                            module: id,
                            transform: "scan".to_string(),
                            message: join_error.to_string(),
                        });
                    }
                    continue;
                }
            };

            let done = match outcome {
                Ok(done) => done,
                Err(e) => {
                    table.fail(&id);
                    errors.push(e);
                    continue;
                }
            };

            let mut dependencies = Vec::with_capacity(done.specifiers.len());
            for specifier in &done.specifiers {
                match self.resolver.resolve(specifier, Some(&done.id)) {
                    Ok(target) => {
                        if let ResolvedTarget::Module(dep) = &target {
                            self.claim(&table, &mut jobs, dep);
                        }
                        dependencies.push(Dependency::new(specifier.as_str(), target));
                    }
                    Err(e) => errors.push(e),
                }
            }

            if let Err(e) = table.complete(done.into_record(dependencies)) {
                errors.push(e.into());
            }
        }

        for id in table.pending() {
            errors.push(Error::Transform {
                message: "job ended without producing a result".to_string(),
                transform: "scan".to_string(),
                module: id,
            });
        }

        if !errors.is_empty() {
            return Err(GraphError::new(errors).into());
        }

        let graph = table.into_graph(entry_ids)?;
        info!(modules = graph.len(), entries = graph.entries().len(), "module graph built");

        if self.warn_on_cycles {
            let root = self.resolver.root();
            for cycle in graph.cycles() {
                let path: Vec<String> = cycle.iter().map(|id| id.display_relative(root)).collect();
                warn!(cycle = %path.join(" -> "), "import cycle");
            }
        }

        Ok(graph)
    }

    fn claim(&self, table: &ModuleTable, jobs: &mut Jobs, id: &ModuleId) {
        if !table.claim(id) {
            return;
        }
        let scheduler = Arc::clone(&self.scheduler);
        let id = id.clone();
        let owner = id.clone();
        let handle = jobs.set.spawn(async move {
            let outcome = scheduler.submit(TransformJob::new(id.clone())).await;
            (id, outcome)
        });
        jobs.owners.insert(handle.id(), owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ExternalLinkResolver;
    use crate::pool::WorkerPool;
    use crate::transform::{Transform, TransformRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tote_config::ResolveConfig;
    use std::path::{Path, PathBuf};
    use tote_graph::runtime::test_utils::MemoryRuntime;
    use tote_graph::{Runtime, RuntimeResult};

    /// Panics while reading `b.js`, outside any pool worker.
    #[derive(Debug)]
    struct BrokenRead(MemoryRuntime);

    #[async_trait::async_trait]
    impl Runtime for BrokenRead {
        async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
            if path.ends_with("b.js") {
                panic!("disk fell off");
            }
            self.0.read_file(path).await
        }

        fn is_file(&self, path: &Path) -> bool {
            self.0.is_file(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.0.is_dir(path)
        }

        fn get_cwd(&self) -> RuntimeResult<PathBuf> {
            self.0.get_cwd()
        }
    }

    fn builder(runtime: MemoryRuntime, registry: TransformRegistry) -> DependencyGraphBuilder {
        builder_on(Arc::new(runtime), registry)
    }

    fn builder_on(runtime: Arc<dyn Runtime>, registry: TransformRegistry) -> DependencyGraphBuilder {
        let resolver = ModuleResolver::new(
            Arc::clone(&runtime),
            "/p",
            ResolveConfig::default(),
            Arc::new(ExternalLinkResolver::default()),
        )
        .with_global("vue", "Vue");
        let scheduler = TransformScheduler::new(runtime, registry, WorkerPool::new(4));
        DependencyGraphBuilder::new(Arc::new(resolver), Arc::new(scheduler))
    }

    fn entries(pairs: &[(&str, &str)]) -> IndexMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(name, spec)| (name.to_string(), vec![spec.to_string()]))
            .collect()
    }

    fn id(path: &str) -> ModuleId {
        ModuleId::new(path).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn two_module_graph() {
        let runtime = MemoryRuntime::new("/p");
        runtime
            .add_file("a.js", "require('./b.js');")
            .add_file("b.js", "module.exports = 1;");

        let graph = builder(runtime, TransformRegistry::new())
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.entries()["main"], vec![id("/p/a.js")]);
        assert_eq!(graph.dependencies(&id("/p/a.js")), vec![&id("/p/b.js")]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_file_through_different_specifiers_is_transformed_once() {
        let runtime = MemoryRuntime::new("/p");
        runtime
            .add_file("a.js", "require('./shared');\nrequire('./lib/../shared.js');\nrequire('./c');")
            .add_file("c.js", "require('/p/shared.js');")
            .add_file("shared.js", "module.exports = 'shared';");

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = TransformRegistry::new();
        registry.push(Transform::new(
            "count",
            |id: &ModuleId| id.as_path().ends_with("shared.js"),
            move |_, content| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(content.into())
            },
        ));

        let graph = builder(runtime, registry)
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_cycles_terminate() {
        let runtime = MemoryRuntime::new("/p");
        runtime
            .add_file("a.js", "require('./b');")
            .add_file("b.js", "require('./a');");

        let graph = builder(runtime, TransformRegistry::new())
            .warn_on_cycles(true)
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.cycles().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn externals_never_become_records() {
        let runtime = MemoryRuntime::new("/p");
        runtime
            .add_file("a.js", "const Vue = require('vue');")
            .add_file("node_modules/vue/index.js", "huge");

        let graph = builder(runtime, TransformRegistry::new())
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap();

        assert_eq!(graph.len(), 1);
        let record = graph.get(&id("/p/a.js")).unwrap();
        let external = record.external_dependencies().next().unwrap();
        assert_eq!(external.global_binding_name, "Vue");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn errors_are_collected_across_siblings() {
        let runtime = MemoryRuntime::new("/p");
        runtime
            .add_file("a.js", "require('./missing-one');\nrequire('./ok');\nrequire('./b');")
            .add_file("b.js", "require('./missing-two');")
            .add_file("ok.js", "");

        let err = builder(runtime, TransformRegistry::new())
            .build(&entries(&[("main", "./a.js"), ("broken", "./nope.js")]))
            .await
            .unwrap_err();

        let Error::Graph(graph) = err else {
            panic!("expected graph error");
        };
        assert_eq!(graph.len(), 3);
        assert!(graph.errors.iter().all(|e| matches!(e, Error::Resolution { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dead_jobs_are_reported_with_their_panic() {
        let runtime = MemoryRuntime::new("/p");
        runtime
            .add_file("a.js", "require('./b.js');\nrequire('./c.js');")
            .add_file("b.js", "")
            .add_file("c.js", "");

        let err = builder_on(Arc::new(BrokenRead(runtime)), TransformRegistry::new())
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap_err();

        let Error::Graph(graph) = err else {
            panic!("expected graph error");
        };
        assert_eq!(graph.len(), 1);
        match &graph.errors[0] {
            Error::Transform { module, message, .. } => {
                assert_eq!(module, &id("/p/b.js"));
                assert!(message.contains("disk fell off"), "{message}");
            }
            other => panic!("expected transform error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_transforms_keep_their_message() {
        let runtime = MemoryRuntime::new("/p");
        runtime.add_file("a.js", "");

        let mut registry = TransformRegistry::new();
        registry.push(Transform::new("explode", |_| true, |_, _| panic!("bad input")));

        let err = builder(runtime, registry)
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap_err();
        let Error::Graph(graph) = err else {
            panic!("expected graph error");
        };
        match &graph.errors[0] {
            Error::Transform { transform, message, .. } => {
                assert_eq!(transform, "explode");
                assert!(message.contains("bad input"), "{message}");
            }
            other => panic!("expected transform error, got {other:?}"),
        }
    }
}
