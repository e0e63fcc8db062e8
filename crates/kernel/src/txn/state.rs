//! Before/after snapshots of single entities within one transaction.
//!
//! Every entity touched by a transaction gets exactly one [`TxnState`]. The
//! state captures the entity before its first change and again at commit;
//! undo and redo write those snapshots back into the store and then
//! invalidate whatever depends on the entity.

use std::fmt;

use brep_types::{DirtyFlags, EntityFlags, EntityKind, EntityTransactionType, TransactionState};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::context::TxnContext;
use crate::invalidate::propagate_dirty;
use crate::topology::entity::EntityRef;
use crate::topology::store::{
    CoEdge, CoEdgeId, Edge, EdgeId, EntityStore, Face, FaceId, Loop, LoopId, Vertex, VertexId,
};

/// Lifecycle of a transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TxnPhase {
    #[default]
    Unrecorded,
    CapturedBefore,
    /// Committed; the store holds the after snapshot.
    Applied,
    UndoRestored,
    RedoRestored,
}

/// A copy of one entity's persistent fields that can be written back.
pub trait Snapshot: Clone + fmt::Debug + Sized {
    const KIND: EntityKind;
    type Id: Copy + Eq + fmt::Debug + Into<EntityRef>;

    fn id_of(entity: EntityRef) -> Option<Self::Id>;

    fn capture(store: &EntityStore, id: Self::Id) -> Option<Self>;

    /// Overwrite the entity in place. Dirty flags are left to
    /// [`Snapshot::post_restore`].
    fn apply(&self, store: &mut EntityStore, id: Self::Id);

    /// Invalidate the entity and everything above it.
    fn post_restore(store: &mut EntityStore, id: Self::Id) {
        propagate_dirty(store, id.into(), DirtyFlags::RESTORED);
    }
}

macro_rules! impl_snapshot {
    ($ty:ty, $id:ty, $variant:ident, $field:ident) => {
        impl Snapshot for $ty {
            const KIND: EntityKind = EntityKind::$variant;
            type Id = $id;

            fn id_of(entity: EntityRef) -> Option<Self::Id> {
                match entity {
                    EntityRef::$variant(id) => Some(id),
                    _ => None,
                }
            }

            fn capture(store: &EntityStore, id: Self::Id) -> Option<Self> {
                store.$field.get(id).cloned()
            }

            fn apply(&self, store: &mut EntityStore, id: Self::Id) {
                if let Some(slot) = store.$field.get_mut(id) {
                    let dirty = slot.dirty;
                    *slot = self.clone();
                    slot.dirty = dirty;
                }
            }
        }
    };
}

impl_snapshot!(Vertex, VertexId, Vertex, vertices);
impl_snapshot!(Edge, EdgeId, Edge, edges);
impl_snapshot!(CoEdge, CoEdgeId, CoEdge, coedges);
impl_snapshot!(Loop, LoopId, Loop, loops);

impl Snapshot for Face {
    const KIND: EntityKind = EntityKind::Face;
    type Id = FaceId;

    fn id_of(entity: EntityRef) -> Option<Self::Id> {
        match entity {
            EntityRef::Face(id) => Some(id),
            _ => None,
        }
    }

    fn capture(store: &EntityStore, id: Self::Id) -> Option<Self> {
        store.faces.get(id).cloned()
    }

    fn apply(&self, store: &mut EntityStore, id: Self::Id) {
        if let Some(slot) = store.faces.get_mut(id) {
            let dirty = slot.dirty;
            *slot = self.clone();
            slot.dirty = dirty;
            slot.cached_bound = None;
        }
    }
}

/// Shared contract of all transaction states.
pub trait EntityTxnState {
    fn entity(&self) -> EntityRef;

    /// The kind of change that opened this state.
    fn transaction_type(&self) -> EntityTransactionType;

    /// The kind of change as of commit; a removed entity reads `Deletion`.
    fn last_type(&self) -> EntityTransactionType;

    fn phase(&self) -> TxnPhase;

    fn capture_before(&mut self, store: &EntityStore);

    fn capture_after(&mut self, store: &EntityStore);

    /// Write the snapshot for `state` back into the store. Restoring to the
    /// state already in effect does nothing.
    fn restore(&mut self, ctx: &mut TxnContext<'_>, state: TransactionState);

    /// Invalidate dependents after every state of a request was restored.
    fn post_restore(&self, ctx: &mut TxnContext<'_>);
}

/// Transaction state for one entity of kind `S`.
#[derive(Debug, Clone)]
pub struct TxnRecord<S: Snapshot> {
    id: S::Id,
    txn_type: EntityTransactionType,
    last_type: EntityTransactionType,
    phase: TxnPhase,
    in_effect: Option<TransactionState>,
    before: Option<S>,
    after: Option<S>,
}

pub type VertexTxnState = TxnRecord<Vertex>;
pub type EdgeTxnState = TxnRecord<Edge>;
pub type CoEdgeTxnState = TxnRecord<CoEdge>;
pub type LoopTxnState = TxnRecord<Loop>;
pub type FaceTxnState = TxnRecord<Face>;

impl<S: Snapshot> TxnRecord<S> {
    pub fn new(id: S::Id, txn_type: EntityTransactionType) -> Self {
        Self {
            id,
            txn_type,
            last_type: txn_type,
            phase: TxnPhase::Unrecorded,
            in_effect: None,
            before: None,
            after: None,
        }
    }

    pub fn id(&self) -> S::Id {
        self.id
    }

    pub fn before(&self) -> Option<&S> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&S> {
        self.after.as_ref()
    }

    pub fn set_last_type(&mut self, last_type: EntityTransactionType) {
        self.last_type = last_type;
    }

    /// Fold a later state of the same entity into this one: the earlier
    /// before snapshot stays, the later after snapshot wins.
    pub fn absorb(&mut self, later: Self) {
        self.after = later.after;
        self.last_type = later.last_type;
        self.phase = later.phase;
        self.in_effect = later.in_effect;
    }
}

impl<S: Snapshot> EntityTxnState for TxnRecord<S> {
    fn entity(&self) -> EntityRef {
        self.id.into()
    }

    fn transaction_type(&self) -> EntityTransactionType {
        self.txn_type
    }

    fn last_type(&self) -> EntityTransactionType {
        self.last_type
    }

    fn phase(&self) -> TxnPhase {
        self.phase
    }

    fn capture_before(&mut self, store: &EntityStore) {
        if self.txn_type != EntityTransactionType::Creation {
            self.before = S::capture(store, self.id);
        }
        self.phase = TxnPhase::CapturedBefore;
    }

    fn capture_after(&mut self, store: &EntityStore) {
        self.after = S::capture(store, self.id);
        self.phase = TxnPhase::Applied;
        self.in_effect = Some(TransactionState::Redo);
    }

    fn restore(&mut self, ctx: &mut TxnContext<'_>, state: TransactionState) {
        if state == TransactionState::Default || self.in_effect == Some(state) {
            return;
        }
        if self.last_type == EntityTransactionType::Recycling {
            return;
        }
        let Some(id) = ctx.resolve(self.entity()).and_then(S::id_of) else {
            debug!(entity = %self.entity(), ?state, "restore target is gone");
            return;
        };

        let snapshot = match state {
            TransactionState::Undo => self.before.as_ref(),
            _ => self.after.as_ref(),
        };
        match snapshot {
            Some(snapshot) => snapshot.apply(ctx.store, id),
            None => ctx
                .store
                .write_flags(id.into(), |flags| flags.insert(EntityFlags::REMOVED)),
        }

        self.in_effect = Some(state);
        self.phase = match state {
            TransactionState::Undo => TxnPhase::UndoRestored,
            _ => TxnPhase::RedoRestored,
        };
        trace!(kind = %S::KIND, entity = %self.entity(), ?state, "restored");
    }

    fn post_restore(&self, ctx: &mut TxnContext<'_>) {
        if self.last_type == EntityTransactionType::Recycling {
            return;
        }
        let Some(id) = ctx.resolve(self.entity()).and_then(S::id_of) else {
            debug!(entity = %self.entity(), "post-restore target is gone");
            return;
        };
        S::post_restore(ctx.store, id);
    }
}

/// Transaction state of any entity kind.
#[derive(Debug, Clone)]
pub enum TxnState {
    Vertex(VertexTxnState),
    Edge(EdgeTxnState),
    CoEdge(CoEdgeTxnState),
    Loop(LoopTxnState),
    Face(FaceTxnState),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            TxnState::Vertex($s) => $body,
            TxnState::Edge($s) => $body,
            TxnState::CoEdge($s) => $body,
            TxnState::Loop($s) => $body,
            TxnState::Face($s) => $body,
        }
    };
}

impl TxnState {
    /// The state type matching the entity's kind.
    pub fn create(entity: EntityRef, txn_type: EntityTransactionType) -> Self {
        match entity {
            EntityRef::Vertex(id) => TxnState::Vertex(TxnRecord::new(id, txn_type)),
            EntityRef::Edge(id) => TxnState::Edge(TxnRecord::new(id, txn_type)),
            EntityRef::CoEdge(id) => TxnState::CoEdge(TxnRecord::new(id, txn_type)),
            EntityRef::Loop(id) => TxnState::Loop(TxnRecord::new(id, txn_type)),
            EntityRef::Face(id) => TxnState::Face(TxnRecord::new(id, txn_type)),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.entity().kind()
    }

    pub fn set_last_type(&mut self, last_type: EntityTransactionType) {
        dispatch!(self, s => s.set_last_type(last_type))
    }

    /// Fold a later state of the same entity into this one. States of
    /// different entities are left alone.
    pub fn absorb(&mut self, later: TxnState) {
        match (self, later) {
            (TxnState::Vertex(a), TxnState::Vertex(b)) if a.id == b.id => a.absorb(b),
            (TxnState::Edge(a), TxnState::Edge(b)) if a.id == b.id => a.absorb(b),
            (TxnState::CoEdge(a), TxnState::CoEdge(b)) if a.id == b.id => a.absorb(b),
            (TxnState::Loop(a), TxnState::Loop(b)) if a.id == b.id => a.absorb(b),
            (TxnState::Face(a), TxnState::Face(b)) if a.id == b.id => a.absorb(b),
            (this, later) => {
                debug!(entity = %this.entity(), other = %later.entity(), "cannot merge states of different entities");
            }
        }
    }
}

impl EntityTxnState for TxnState {
    fn entity(&self) -> EntityRef {
        dispatch!(self, s => s.entity())
    }

    fn transaction_type(&self) -> EntityTransactionType {
        dispatch!(self, s => s.transaction_type())
    }

    fn last_type(&self) -> EntityTransactionType {
        dispatch!(self, s => s.last_type())
    }

    fn phase(&self) -> TxnPhase {
        dispatch!(self, s => s.phase())
    }

    fn capture_before(&mut self, store: &EntityStore) {
        dispatch!(self, s => s.capture_before(store))
    }

    fn capture_after(&mut self, store: &EntityStore) {
        dispatch!(self, s => s.capture_after(store))
    }

    fn restore(&mut self, ctx: &mut TxnContext<'_>, state: TransactionState) {
        dispatch!(self, s => s.restore(ctx, state))
    }

    fn post_restore(&self, ctx: &mut TxnContext<'_>) {
        dispatch!(self, s => s.post_restore(ctx))
    }
}
