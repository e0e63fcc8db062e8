use std::collections::HashMap;

use super::state::{EntityTxnState, TxnState};
use crate::topology::entity::EntityRef;

/// Transaction states in first-touch order, one per entity.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    states: Vec<TxnState>,
    index: HashMap<EntityRef, usize>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        self.index.contains_key(&entity)
    }

    /// Add a state. A second state for the same entity is ignored.
    pub fn insert(&mut self, state: TxnState) -> bool {
        let entity = state.entity();
        if self.index.contains_key(&entity) {
            return false;
        }
        self.index.insert(entity, self.states.len());
        self.states.push(state);
        true
    }

    pub fn get(&self, entity: EntityRef) -> Option<&TxnState> {
        self.index.get(&entity).map(|&i| &self.states[i])
    }

    pub fn get_mut(&mut self, entity: EntityRef) -> Option<&mut TxnState> {
        self.index.get(&entity).map(|&i| &mut self.states[i])
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TxnState> {
        self.states.iter()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut TxnState> {
        self.states.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Keep only the states `keep` accepts, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&TxnState) -> bool) {
        self.states.retain(keep);
        self.index = self
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.entity(), i))
            .collect();
    }
}
