use std::collections::HashMap;

use crate::topology::entity::EntityRef;
use crate::topology::store::EntityStore;

/// What a restore runs against: the store plus a table of entities that
/// were re-keyed since the states were recorded.
#[derive(Debug)]
pub struct TxnContext<'a> {
    pub store: &'a mut EntityStore,
    relocations: HashMap<EntityRef, EntityRef>,
}

impl<'a> TxnContext<'a> {
    pub fn new(store: &'a mut EntityStore) -> Self {
        Self {
            store,
            relocations: HashMap::new(),
        }
    }

    /// Route later lookups of `from` to `to`.
    pub fn relocate(&mut self, from: EntityRef, to: EntityRef) {
        self.relocations.insert(from, to);
    }

    /// The entity a recorded reference points at now, or `None` if it no
    /// longer has a slot in the store. Removed entities still resolve.
    pub fn resolve(&self, entity: EntityRef) -> Option<EntityRef> {
        let target = self.relocations.get(&entity).copied().unwrap_or(entity);
        if target.kind() != entity.kind() {
            return None;
        }
        self.store.contains(target).then_some(target)
    }
}
