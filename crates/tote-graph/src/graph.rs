use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;

use crate::{GraphModelError, ModuleId, ModuleRecord};

/// The fully resolved module graph of one build.
///
/// Module iteration order is canonical: a depth-first walk from the entries
/// (in declaration order) following dependencies in source order, with each
/// module placed after the modules it imports. The order therefore depends
/// only on graph contents, never on the order transforms finished in.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: IndexMap<ModuleId, Arc<ModuleRecord>>,
    entries: IndexMap<String, Vec<ModuleId>>,
}

impl ModuleGraph {
    /// Assemble a graph from finished records.
    ///
    /// Fails when an entry or a dependency points at a module that has no
    /// record, so a constructed graph never contains dangling edges.
    pub fn from_parts(
        records: impl IntoIterator<Item = Arc<ModuleRecord>>,
        entries: IndexMap<String, Vec<ModuleId>>,
    ) -> Result<Self, GraphModelError> {
        let mut by_id: FxHashMap<ModuleId, Arc<ModuleRecord>> = records
            .into_iter()
            .map(|record| (record.id().clone(), record))
            .collect();

        for (name, ids) in &entries {
            for id in ids {
                if !by_id.contains_key(id) {
                    return Err(GraphModelError::UnknownEntry {
                        entry: name.clone(),
                        module: id.clone(),
                    });
                }
            }
        }

        for record in by_id.values() {
            for dep in record.local_dependencies() {
                if !by_id.contains_key(dep) {
                    return Err(GraphModelError::DanglingDependency {
                        from: record.id().clone(),
                        to: dep.clone(),
                    });
                }
            }
        }

        let roots: Vec<&ModuleId> = entries.values().flatten().collect();
        let order = post_order(&roots, |id| {
            by_id
                .get(id)
                .map(|record| record.local_dependencies().cloned().collect())
                .unwrap_or_default()
        });

        let mut modules = IndexMap::with_capacity(by_id.len());
        for id in order {
            if let Some(record) = by_id.remove(&id) {
                modules.insert(id, record);
            }
        }

        // Records nobody reaches still belong to the graph; keep them in id order.
        let mut leftovers: Vec<_> = by_id.into_iter().collect();
        leftovers.sort_by(|a, b| a.0.cmp(&b.0));
        modules.extend(leftovers);

        Ok(Self { modules, entries })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, id: &ModuleId) -> Option<&Arc<ModuleRecord>> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Records in canonical order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleRecord>> {
        self.modules.values()
    }

    /// Position of a module in canonical order.
    pub fn order_of(&self, id: &ModuleId) -> Option<usize> {
        self.modules.get_index_of(id)
    }

    /// Entry name → entry module ids, in declaration order.
    pub fn entries(&self) -> &IndexMap<String, Vec<ModuleId>> {
        &self.entries
    }

    pub fn entry_ids(&self) -> IndexSet<&ModuleId> {
        self.entries.values().flatten().collect()
    }

    pub fn is_entry(&self, id: &ModuleId) -> bool {
        self.entries.values().any(|ids| ids.contains(id))
    }

    /// Direct local dependencies of `id` in source order.
    pub fn dependencies(&self, id: &ModuleId) -> Vec<&ModuleId> {
        self.modules
            .get(id)
            .map(|record| record.local_dependencies().collect())
            .unwrap_or_default()
    }

    /// Every module reachable from `roots` (roots included), in dependency-first order.
    pub fn reachable_from<'a>(&'a self, roots: &[&'a ModuleId]) -> IndexSet<ModuleId> {
        post_order(roots, |id| {
            self.modules
                .get(id)
                .map(|record| record.local_dependencies().cloned().collect())
                .unwrap_or_default()
        })
        .into_iter()
        .collect()
    }

    /// Import cycles, each reported once as the path that closes it.
    ///
    /// A cycle `a → b → a` is returned as `[a, b, a]`. Self imports show up as
    /// `[a, a]`.
    pub fn cycles(&self) -> Vec<Vec<ModuleId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let ids: Vec<&ModuleId> = self.modules.keys().collect();
        let mut marks = vec![Mark::Unvisited; ids.len()];
        let mut cycles = Vec::new();

        for start in 0..ids.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            let mut stack: Vec<(usize, Vec<usize>, usize)> = Vec::new();
            marks[start] = Mark::OnStack;
            stack.push((start, self.dependency_indices(ids[start]), 0));

            while let Some((node, children, cursor)) = stack.last_mut() {
                let Some(&child) = children.get(*cursor) else {
                    marks[*node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                *cursor += 1;

                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::OnStack;
                        let grandchildren = self.dependency_indices(ids[child]);
                        stack.push((child, grandchildren, 0));
                    }
                    Mark::OnStack => {
                        let from = stack
                            .iter()
                            .position(|(n, _, _)| *n == child)
                            .unwrap_or(0);
                        let mut path: Vec<ModuleId> =
                            stack[from..].iter().map(|(n, _, _)| ids[*n].clone()).collect();
                        path.push(ids[child].clone());
                        cycles.push(path);
                    }
                    Mark::Done => {}
                }
            }
        }

        cycles
    }

    fn dependency_indices(&self, id: &ModuleId) -> Vec<usize> {
        self.dependencies(id)
            .into_iter()
            .filter_map(|dep| self.modules.get_index_of(dep))
            .collect()
    }
}

/// Iterative depth-first post-order over `roots`.
fn post_order<F>(roots: &[&ModuleId], mut children: F) -> Vec<ModuleId>
where
    F: FnMut(&ModuleId) -> Vec<ModuleId>,
{
    let mut visited: IndexSet<ModuleId> = IndexSet::new();
    let mut order = Vec::new();

    for root in roots {
        if !visited.insert((*root).clone()) {
            continue;
        }
        let mut stack = vec![((*root).clone(), children(root), 0usize)];

        while let Some((node, kids, cursor)) = stack.last_mut() {
            if let Some(next) = kids.get(*cursor).cloned() {
                *cursor += 1;
                if visited.insert(next.clone()) {
                    let grandkids = children(&next);
                    stack.push((next, grandkids, 0));
                }
            } else {
                order.push(node.clone());
                stack.pop();
            }
        }
    }

    order
}
