use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indexmap::IndexMap;

use crate::{GraphModelError, ModuleGraph, ModuleId, ModuleRecord};

#[derive(Debug, Clone)]
enum Slot {
    /// Claimed by a discoverer; transform or resolution still in flight.
    Resolving,
    Ready(Arc<ModuleRecord>),
    Failed,
}

/// Claim-once module table shared by every producer during graph construction.
///
/// The first caller of [`ModuleTable::claim`] for an id wins and owns the
/// job that eventually fills the slot; every later caller gets `false` and
/// only records an edge to the id. Ready records are immutable and handed
/// out as `Arc` clones.
#[derive(Debug, Default)]
pub struct ModuleTable {
    slots: DashMap<ModuleId, Slot>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `id`. Returns `true` only for the first claimant.
    pub fn claim(&self, id: &ModuleId) -> bool {
        match self.slots.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Resolving);
                true
            }
        }
    }

    /// Publish the finished record for a claimed id.
    pub fn complete(&self, record: ModuleRecord) -> Result<Arc<ModuleRecord>, GraphModelError> {
        let id = record.id().clone();
        let mut slot = self
            .slots
            .get_mut(&id)
            .ok_or_else(|| GraphModelError::NotClaimed(id.clone()))?;

        if !matches!(*slot, Slot::Resolving) {
            return Err(GraphModelError::AlreadyCompleted(id));
        }
        let record = Arc::new(record);
        *slot = Slot::Ready(Arc::clone(&record));
        Ok(record)
    }

    /// Mark a claimed id as failed. Its error is reported by the caller.
    pub fn fail(&self, id: &ModuleId) {
        if let Some(mut slot) = self.slots.get_mut(id) {
            *slot = Slot::Failed;
        }
    }

    pub fn get(&self, id: &ModuleId) -> Option<Arc<ModuleRecord>> {
        self.slots.get(id).and_then(|slot| match &*slot {
            Slot::Ready(record) => Some(Arc::clone(record)),
            Slot::Resolving | Slot::Failed => None,
        })
    }

    pub fn is_claimed(&self, id: &ModuleId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ids still in the resolving state, sorted for stable reporting.
    pub fn pending(&self) -> Vec<ModuleId> {
        let mut pending: Vec<ModuleId> = self
            .slots
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Resolving))
            .map(|entry| entry.key().clone())
            .collect();
        pending.sort();
        pending
    }

    /// Freeze the table into a graph.
    ///
    /// Every claimed id must have reached a terminal state, and none may have
    /// failed: the graph handed to chunk splitting is always fully resolved.
    pub fn into_graph(
        self,
        entries: IndexMap<String, Vec<ModuleId>>,
    ) -> Result<ModuleGraph, GraphModelError> {
        if let Some(id) = self.pending().into_iter().next() {
            return Err(GraphModelError::StillResolving(id));
        }

        let mut records = Vec::with_capacity(self.slots.len());
        for (id, slot) in self.slots {
            match slot {
                Slot::Ready(record) => records.push(record),
                Slot::Failed => return Err(GraphModelError::FailedModule(id)),
                Slot::Resolving => return Err(GraphModelError::StillResolving(id)),
            }
        }

        ModuleGraph::from_parts(records, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(format!("/table/{name}")).unwrap()
    }

    #[test]
    fn only_first_claim_wins() {
        let table = ModuleTable::new();
        assert!(table.claim(&id("a.js")));
        assert!(!table.claim(&id("a.js")));
        assert!(table.is_claimed(&id("a.js")));
        assert_eq!(table.pending(), vec![id("a.js")]);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let table = Arc::new(ModuleTable::new());
        let target = id("shared.js");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let table = Arc::clone(&table);
                let target = target.clone();
                thread::spawn(move || table.claim(&target))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn complete_requires_claim_and_happens_once() {
        let table = ModuleTable::new();
        let record = ModuleRecord::builder(id("a.js"), b"x".to_vec()).build();
        assert!(matches!(
            table.complete(record.clone()),
            Err(GraphModelError::NotClaimed(_))
        ));

        table.claim(&id("a.js"));
        table.complete(record.clone()).unwrap();
        assert!(matches!(
            table.complete(record),
            Err(GraphModelError::AlreadyCompleted(_))
        ));
        assert_eq!(table.get(&id("a.js")).unwrap().content(), b"x");
    }

    #[test]
    fn into_graph_rejects_unfinished_modules() {
        let table = ModuleTable::new();
        table.claim(&id("a.js"));
        let entries = IndexMap::from([("main".to_string(), vec![id("a.js")])]);
        assert!(matches!(
            table.into_graph(entries),
            Err(GraphModelError::StillResolving(_))
        ));
    }

    #[test]
    fn into_graph_builds_from_ready_records() {
        let table = ModuleTable::new();
        table.claim(&id("a.js"));
        table
            .complete(ModuleRecord::builder(id("a.js"), Vec::new()).build())
            .unwrap();
        let entries = IndexMap::from([("main".to_string(), vec![id("a.js")])]);
        let graph = table.into_graph(entries).unwrap();
        assert_eq!(graph.len(), 1);
    }
}
