use std::fmt;

use brep_types::{EntityTransactionType, TransactionState};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::context::TxnContext;
use super::recording::Recording;
use super::state::{EntityTxnState, TxnState};
use crate::error::KernelError;
use crate::topology::entity::EntityRef;
use crate::topology::store::EntityStore;

/// A committed unit of work the manager can undo and redo.
pub trait Request: fmt::Debug {
    fn label(&self) -> &str;

    /// Called once when the request enters history.
    fn on_commit(&mut self, store: &mut EntityStore) -> Result<(), KernelError>;

    fn on_undo(&mut self, ctx: &mut TxnContext<'_>) -> Result<(), KernelError>;

    fn on_redo(&mut self, ctx: &mut TxnContext<'_>) -> Result<(), KernelError>;
}

/// A request whose undo data is the per-entity states recorded by the store.
#[derive(Debug, Clone)]
pub struct StateRequest {
    id: Uuid,
    label: String,
    states: Recording,
}

impl StateRequest {
    /// Open a request and start recording on `store`.
    pub fn begin(store: &mut EntityStore, label: impl Into<String>) -> Result<Self, KernelError> {
        store.begin_recording()?;
        Ok(Self {
            id: Uuid::new_v4(),
            label: label.into(),
            states: Recording::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn states(&self) -> impl Iterator<Item = &TxnState> {
        self.states.iter()
    }

    pub fn state(&self, entity: EntityRef) -> Option<&TxnState> {
        self.states.get(entity)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of states whose final change is `txn_type`.
    pub fn count(&self, txn_type: EntityTransactionType) -> usize {
        self.states.iter().filter(|s| s.last_type() == txn_type).count()
    }

    /// Close recording and roll the store back to where the request began.
    pub fn abort(self, store: &mut EntityStore) -> Result<(), KernelError> {
        let mut states = store.end_recording()?;
        for state in states.iter_mut() {
            state.capture_after(store);
        }
        let mut ctx = TxnContext::new(store);
        restore_all(&mut states, &mut ctx, TransactionState::Undo);
        debug!(label = %self.label, states = states.len(), "aborted request");
        Ok(())
    }

    /// Merge a later request into this one. For entities both touched, the
    /// earlier before snapshot and the later after snapshot are kept.
    pub fn compose(&mut self, next: StateRequest) {
        for state in next.states.iter() {
            match self.states.get_mut(state.entity()) {
                Some(existing) => existing.absorb(state.clone()),
                None => {
                    self.states.insert(state.clone());
                }
            }
        }
    }
}

fn restore_all(states: &mut Recording, ctx: &mut TxnContext<'_>, target: TransactionState) {
    match target {
        TransactionState::Undo => states.iter_mut().rev().for_each(|s| s.restore(ctx, target)),
        _ => states.iter_mut().for_each(|s| s.restore(ctx, target)),
    }
    for state in states.iter() {
        state.post_restore(ctx);
    }
}

impl Request for StateRequest {
    fn label(&self) -> &str {
        &self.label
    }

    /// Close recording, classify deletions and capture after snapshots.
    /// Entities created and removed inside the request leave no trace.
    #[instrument(skip_all, fields(label = %self.label))]
    fn on_commit(&mut self, store: &mut EntityStore) -> Result<(), KernelError> {
        let mut states = store.end_recording()?;
        states.retain(|s| {
            !(s.transaction_type() == EntityTransactionType::Creation && !store.is_live(s.entity()))
        });
        for state in states.iter_mut() {
            if !store.is_live(state.entity()) {
                state.set_last_type(EntityTransactionType::Deletion);
            }
            state.capture_after(store);
        }
        debug!(states = states.len(), "committed request");
        self.states = states;
        Ok(())
    }

    #[instrument(skip_all, fields(label = %self.label))]
    fn on_undo(&mut self, ctx: &mut TxnContext<'_>) -> Result<(), KernelError> {
        restore_all(&mut self.states, ctx, TransactionState::Undo);
        Ok(())
    }

    #[instrument(skip_all, fields(label = %self.label))]
    fn on_redo(&mut self, ctx: &mut TxnContext<'_>) -> Result<(), KernelError> {
        restore_all(&mut self.states, ctx, TransactionState::Redo);
        Ok(())
    }
}
