use brep_types::{DirtyFlags, EntityFlags, EntityKind, EntityTransactionType};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, trace};

use super::entity::EntityRef;
use crate::error::KernelError;
use crate::geometry::bound::BoundingBox;
use crate::geometry::curves::Curve;
use crate::geometry::point::Point3d;
use crate::invalidate::propagate_dirty;
use crate::txn::recording::Recording;
use crate::txn::state::{EntityTxnState, TxnState};

// ─── Entity Keys ─────────────────────────────────────────────────────────────

new_key_type! {
    pub struct VertexId;
    pub struct EdgeId;
    pub struct CoEdgeId;
    pub struct LoopId;
    pub struct FaceId;
}

// ─── Topological Entities ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub point: Point3d,
    /// Edges using this vertex as an endpoint.
    pub edges: Vec<EdgeId>,
    pub flags: EntityFlags,
    #[serde(skip)]
    pub dirty: DirtyFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Numeric id written into topology names.
    pub persistent_id: i64,
    /// Symbolic name; topology names fall back to the persistent id.
    pub topo_name: Option<String>,
    pub curve: Curve,
    pub start: VertexId,
    pub end: VertexId,
    /// Directed uses of this edge, at most two.
    pub coedges: Vec<CoEdgeId>,
    pub flags: EntityFlags,
    #[serde(skip)]
    pub dirty: DirtyFlags,
}

impl Edge {
    /// The name co-edges build their two-field topology names from.
    pub fn name(&self) -> String {
        self.topo_name
            .clone()
            .unwrap_or_else(|| self.persistent_id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoEdge {
    pub edge: EdgeId,
    /// true if this use runs from the edge's end vertex to its start vertex.
    pub is_rev: bool,
    /// Extraordinary co-edges use the three-field topology name.
    pub extraordinary: bool,
    pub owner: Option<LoopId>,
    pub flags: EntityFlags,
    #[serde(skip)]
    pub dirty: DirtyFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub coedges: Vec<CoEdgeId>,
    pub face: Option<FaceId>,
    pub flags: EntityFlags,
    #[serde(skip)]
    pub dirty: DirtyFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub outer_loop: LoopId,
    /// Holes, unique and in insertion order.
    pub inner_loops: Vec<LoopId>,
    pub flags: EntityFlags,
    #[serde(skip)]
    pub dirty: DirtyFlags,
    #[serde(skip)]
    pub(crate) cached_bound: Option<BoundingBox>,
}

// ─── Entity Store ────────────────────────────────────────────────────────────

/// Arena-based storage for all topological entities.
///
/// Every mutation goes through a method on this type so that an open
/// recording captures the entity's state before it changes. Deleted entities
/// keep their slot (flagged [`EntityFlags::REMOVED`]) until
/// [`EntityStore::purge_removed`] runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    pub(crate) vertices: SlotMap<VertexId, Vertex>,
    pub(crate) edges: SlotMap<EdgeId, Edge>,
    pub(crate) coedges: SlotMap<CoEdgeId, CoEdge>,
    pub(crate) loops: SlotMap<LoopId, Loop>,
    pub(crate) faces: SlotMap<FaceId, Face>,
    #[serde(skip)]
    pub(crate) recording: Option<Recording>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Read access ──────────────────────────────────────────────────────

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn coedge(&self, id: CoEdgeId) -> Option<&CoEdge> {
        self.coedges.get(id)
    }

    pub fn loop_data(&self, id: LoopId) -> Option<&Loop> {
        self.loops.get(id)
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    pub fn coedges(&self) -> impl Iterator<Item = (CoEdgeId, &CoEdge)> {
        self.coedges.iter()
    }

    pub fn loops(&self) -> impl Iterator<Item = (LoopId, &Loop)> {
        self.loops.iter()
    }

    pub fn faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces.iter()
    }

    /// Faces not flagged as removed.
    pub fn live_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces
            .iter()
            .filter(|(_, f)| !f.flags.contains(EntityFlags::REMOVED))
    }

    /// Whether the arena holds a slot for `entity`, removed or not.
    pub fn contains(&self, entity: EntityRef) -> bool {
        self.flags(entity).is_some()
    }

    pub fn flags(&self, entity: EntityRef) -> Option<EntityFlags> {
        match entity {
            EntityRef::Vertex(id) => self.vertices.get(id).map(|v| v.flags),
            EntityRef::Edge(id) => self.edges.get(id).map(|e| e.flags),
            EntityRef::CoEdge(id) => self.coedges.get(id).map(|c| c.flags),
            EntityRef::Loop(id) => self.loops.get(id).map(|l| l.flags),
            EntityRef::Face(id) => self.faces.get(id).map(|f| f.flags),
        }
    }

    /// Present and not removed.
    pub fn is_live(&self, entity: EntityRef) -> bool {
        self.flags(entity)
            .is_some_and(|flags| !flags.contains(EntityFlags::REMOVED))
    }

    pub fn live_count(&self, kind: EntityKind) -> usize {
        fn live<K: slotmap::Key, T>(map: &SlotMap<K, T>, flags: impl Fn(&T) -> EntityFlags) -> usize {
            map.values()
                .filter(|v| !flags(v).contains(EntityFlags::REMOVED))
                .count()
        }
        match kind {
            EntityKind::Vertex => live(&self.vertices, |v| v.flags),
            EntityKind::Edge => live(&self.edges, |e| e.flags),
            EntityKind::CoEdge => live(&self.coedges, |c| c.flags),
            EntityKind::Loop => live(&self.loops, |l| l.flags),
            EntityKind::Face => live(&self.faces, |f| f.flags),
        }
    }

    pub fn dirty(&self, entity: EntityRef) -> DirtyFlags {
        match entity {
            EntityRef::Vertex(id) => self.vertices.get(id).map(|v| v.dirty),
            EntityRef::Edge(id) => self.edges.get(id).map(|e| e.dirty),
            EntityRef::CoEdge(id) => self.coedges.get(id).map(|c| c.dirty),
            EntityRef::Loop(id) => self.loops.get(id).map(|l| l.dirty),
            EntityRef::Face(id) => self.faces.get(id).map(|f| f.dirty),
        }
        .unwrap_or_default()
    }

    /// Entities one step up the ownership chain.
    pub fn parents(&self, entity: EntityRef) -> Vec<EntityRef> {
        match entity {
            EntityRef::Vertex(id) => self
                .vertices
                .get(id)
                .map(|v| v.edges.iter().copied().map(EntityRef::Edge).collect())
                .unwrap_or_default(),
            EntityRef::Edge(id) => self
                .edges
                .get(id)
                .map(|e| e.coedges.iter().copied().map(EntityRef::CoEdge).collect())
                .unwrap_or_default(),
            EntityRef::CoEdge(id) => self
                .coedges
                .get(id)
                .and_then(|c| c.owner)
                .map(|l| vec![EntityRef::Loop(l)])
                .unwrap_or_default(),
            EntityRef::Loop(id) => self
                .loops
                .get(id)
                .and_then(|l| l.face)
                .map(|f| vec![EntityRef::Face(f)])
                .unwrap_or_default(),
            EntityRef::Face(_) => Vec::new(),
        }
    }

    /// Vertex a co-edge leaves from.
    pub fn coedge_start_vertex(&self, id: CoEdgeId) -> Option<VertexId> {
        let coedge = self.coedges.get(id)?;
        let edge = self.edges.get(coedge.edge)?;
        Some(if coedge.is_rev { edge.end } else { edge.start })
    }

    /// Vertex a co-edge arrives at.
    pub fn coedge_end_vertex(&self, id: CoEdgeId) -> Option<VertexId> {
        let coedge = self.coedges.get(id)?;
        let edge = self.edges.get(coedge.edge)?;
        Some(if coedge.is_rev { edge.start } else { edge.end })
    }

    // ── Dirty flags ──────────────────────────────────────────────────────

    pub(crate) fn mark_dirty(&mut self, entity: EntityRef, flags: DirtyFlags) {
        match entity {
            EntityRef::Vertex(id) => {
                if let Some(v) = self.vertices.get_mut(id) {
                    v.dirty |= flags;
                }
            }
            EntityRef::Edge(id) => {
                if let Some(e) = self.edges.get_mut(id) {
                    e.dirty |= flags;
                }
            }
            EntityRef::CoEdge(id) => {
                if let Some(c) = self.coedges.get_mut(id) {
                    c.dirty |= flags;
                }
            }
            EntityRef::Loop(id) => {
                if let Some(l) = self.loops.get_mut(id) {
                    l.dirty |= flags;
                }
            }
            EntityRef::Face(id) => {
                if let Some(f) = self.faces.get_mut(id) {
                    f.dirty |= flags;
                    if flags.intersects(DirtyFlags::GEOMETRY | DirtyFlags::BOUND) {
                        f.cached_bound = None;
                    }
                }
            }
        }
    }

    pub fn clear_dirty(&mut self, entity: EntityRef) {
        match entity {
            EntityRef::Vertex(id) => {
                if let Some(v) = self.vertices.get_mut(id) {
                    v.dirty = DirtyFlags::empty();
                }
            }
            EntityRef::Edge(id) => {
                if let Some(e) = self.edges.get_mut(id) {
                    e.dirty = DirtyFlags::empty();
                }
            }
            EntityRef::CoEdge(id) => {
                if let Some(c) = self.coedges.get_mut(id) {
                    c.dirty = DirtyFlags::empty();
                }
            }
            EntityRef::Loop(id) => {
                if let Some(l) = self.loops.get_mut(id) {
                    l.dirty = DirtyFlags::empty();
                }
            }
            EntityRef::Face(id) => {
                if let Some(f) = self.faces.get_mut(id) {
                    f.dirty = DirtyFlags::empty();
                }
            }
        }
    }

    pub fn clear_all_dirty(&mut self) {
        self.vertices.values_mut().for_each(|v| v.dirty = DirtyFlags::empty());
        self.edges.values_mut().for_each(|e| e.dirty = DirtyFlags::empty());
        self.coedges.values_mut().for_each(|c| c.dirty = DirtyFlags::empty());
        self.loops.values_mut().for_each(|l| l.dirty = DirtyFlags::empty());
        self.faces.values_mut().for_each(|f| f.dirty = DirtyFlags::empty());
    }

    // ── Recording ────────────────────────────────────────────────────────

    /// Start capturing per-entity states. Only one recording may be open.
    pub fn begin_recording(&mut self) -> Result<(), KernelError> {
        if self.recording.is_some() {
            return Err(KernelError::TransactionAlreadyOpen);
        }
        self.recording = Some(Recording::new());
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn end_recording(&mut self) -> Result<Recording, KernelError> {
        self.recording.take().ok_or(KernelError::NoOpenTransaction)
    }

    /// Capture `entity` into the open recording, once per recording.
    pub(crate) fn record(&mut self, entity: EntityRef, txn_type: EntityTransactionType) {
        let Some(recording) = self.recording.as_ref() else {
            return;
        };
        if recording.contains(entity) {
            return;
        }
        let mut state = TxnState::create(entity, txn_type);
        state.capture_before(self);
        trace!(%entity, ?txn_type, "recorded txn state");
        if let Some(recording) = self.recording.as_mut() {
            recording.insert(state);
        }
    }

    // ── Mutations ────────────────────────────────────────────────────────

    pub fn add_vertex(&mut self, point: Point3d) -> VertexId {
        let id = self.vertices.insert(Vertex {
            point,
            edges: Vec::new(),
            flags: EntityFlags::empty(),
            dirty: DirtyFlags::empty(),
        });
        self.record(id.into(), EntityTransactionType::Creation);
        id
    }

    /// Move a vertex and invalidate everything built on it.
    pub fn set_vertex_point(&mut self, id: VertexId, point: Point3d) -> Result<(), KernelError> {
        if !self.vertices.contains_key(id) {
            return Err(KernelError::EntityNotFound { entity: id.into() });
        }
        self.record(id.into(), EntityTransactionType::Modification);
        if let Some(v) = self.vertices.get_mut(id) {
            v.point = point;
        }
        propagate_dirty(self, id.into(), DirtyFlags::RESTORED);
        Ok(())
    }

    /// Create an edge between two vertices. Without a curve, a straight
    /// segment is used.
    pub fn add_edge(
        &mut self,
        persistent_id: i64,
        start: VertexId,
        end: VertexId,
        curve: Option<Curve>,
    ) -> Result<EdgeId, KernelError> {
        let p0 = self.vertex_point(start)?;
        let p1 = self.vertex_point(end)?;

        self.record(start.into(), EntityTransactionType::Modification);
        self.record(end.into(), EntityTransactionType::Modification);

        let id = self.edges.insert(Edge {
            persistent_id,
            topo_name: None,
            curve: curve.unwrap_or_else(|| Curve::line(p0, p1)),
            start,
            end,
            coedges: Vec::new(),
            flags: EntityFlags::empty(),
            dirty: DirtyFlags::empty(),
        });
        for v in [start, end] {
            if let Some(vertex) = self.vertices.get_mut(v) {
                if !vertex.edges.contains(&id) {
                    vertex.edges.push(id);
                }
            }
        }
        self.record(id.into(), EntityTransactionType::Creation);
        trace!(?id, persistent_id, "added edge");
        Ok(id)
    }

    pub fn set_edge_topo_name(&mut self, id: EdgeId, name: Option<String>) -> Result<(), KernelError> {
        if !self.edges.contains_key(id) {
            return Err(KernelError::EntityNotFound { entity: id.into() });
        }
        self.record(id.into(), EntityTransactionType::Modification);
        if let Some(edge) = self.edges.get_mut(id) {
            edge.topo_name = name;
        }
        Ok(())
    }

    pub fn set_edge_curve(&mut self, id: EdgeId, curve: Curve) -> Result<(), KernelError> {
        if !self.edges.contains_key(id) {
            return Err(KernelError::EntityNotFound { entity: id.into() });
        }
        self.record(id.into(), EntityTransactionType::Modification);
        if let Some(edge) = self.edges.get_mut(id) {
            edge.curve = curve;
        }
        propagate_dirty(self, id.into(), DirtyFlags::GEOMETRY | DirtyFlags::BOUND);
        Ok(())
    }

    /// Add a directed use to an edge. An edge carries at most two.
    pub fn add_coedge(
        &mut self,
        edge: EdgeId,
        is_rev: bool,
        extraordinary: bool,
    ) -> Result<CoEdgeId, KernelError> {
        let existing = self
            .edges
            .get(edge)
            .ok_or(KernelError::EntityNotFound { entity: edge.into() })?
            .coedges
            .len();
        if existing >= 2 {
            return Err(KernelError::TooManyCoEdges { edge });
        }

        self.record(edge.into(), EntityTransactionType::Modification);
        let id = self.coedges.insert(CoEdge {
            edge,
            is_rev,
            extraordinary,
            owner: None,
            flags: EntityFlags::empty(),
            dirty: DirtyFlags::empty(),
        });
        if let Some(e) = self.edges.get_mut(edge) {
            e.coedges.push(id);
        }
        self.record(id.into(), EntityTransactionType::Creation);
        Ok(id)
    }

    /// Renormalize a co-edge's orientation after a rebuild.
    pub fn set_coedge_rev(&mut self, id: CoEdgeId, is_rev: bool) -> Result<(), KernelError> {
        if !self.coedges.contains_key(id) {
            return Err(KernelError::EntityNotFound { entity: id.into() });
        }
        self.record(id.into(), EntityTransactionType::Modification);
        if let Some(c) = self.coedges.get_mut(id) {
            c.is_rev = is_rev;
        }
        propagate_dirty(self, id.into(), DirtyFlags::GEOMETRY);
        Ok(())
    }

    pub fn add_loop(&mut self, coedges: Vec<CoEdgeId>) -> Result<LoopId, KernelError> {
        for &c in &coedges {
            if !self.coedges.contains_key(c) {
                return Err(KernelError::EntityNotFound { entity: c.into() });
            }
        }
        let id = self.loops.insert(Loop {
            coedges: Vec::new(),
            face: None,
            flags: EntityFlags::empty(),
            dirty: DirtyFlags::empty(),
        });
        self.record(id.into(), EntityTransactionType::Creation);
        self.attach_coedges(id, &coedges);
        if let Some(l) = self.loops.get_mut(id) {
            l.coedges = coedges;
        }
        Ok(id)
    }

    /// Replace a loop's boundary. Co-edges no longer used are detached, not
    /// removed.
    pub fn set_loop_coedges(&mut self, id: LoopId, coedges: Vec<CoEdgeId>) -> Result<(), KernelError> {
        let old = self
            .loops
            .get(id)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })?
            .coedges
            .clone();
        for &c in &coedges {
            if !self.coedges.contains_key(c) {
                return Err(KernelError::EntityNotFound { entity: c.into() });
            }
        }

        self.record(id.into(), EntityTransactionType::Modification);
        for c in old.iter().filter(|c| !coedges.contains(c)) {
            self.record((*c).into(), EntityTransactionType::Modification);
            if let Some(coedge) = self.coedges.get_mut(*c) {
                if coedge.owner == Some(id) {
                    coedge.owner = None;
                }
            }
        }
        self.attach_coedges(id, &coedges);
        if let Some(l) = self.loops.get_mut(id) {
            l.coedges = coedges;
        }
        propagate_dirty(self, id.into(), DirtyFlags::RESTORED);
        Ok(())
    }

    fn attach_coedges(&mut self, owner: LoopId, coedges: &[CoEdgeId]) {
        for &c in coedges {
            if self.coedges.get(c).is_some_and(|co| co.owner == Some(owner)) {
                continue;
            }
            self.record(c.into(), EntityTransactionType::Modification);
            if let Some(coedge) = self.coedges.get_mut(c) {
                coedge.owner = Some(owner);
            }
        }
    }

    pub fn add_face(&mut self, outer_loop: LoopId, inner_loops: Vec<LoopId>) -> Result<FaceId, KernelError> {
        for l in std::iter::once(outer_loop).chain(inner_loops.iter().copied()) {
            if !self.loops.contains_key(l) {
                return Err(KernelError::EntityNotFound { entity: l.into() });
            }
        }
        let id = self.faces.insert(Face {
            outer_loop,
            inner_loops: Vec::new(),
            flags: EntityFlags::empty(),
            dirty: DirtyFlags::empty(),
            cached_bound: None,
        });
        self.record(id.into(), EntityTransactionType::Creation);
        self.attach_loop(id, outer_loop);
        let inner_loops = dedup_loops(inner_loops, outer_loop);
        for &l in &inner_loops {
            self.attach_loop(id, l);
        }
        if let Some(face) = self.faces.get_mut(id) {
            face.inner_loops = inner_loops;
        }
        debug!(?id, ?outer_loop, "added face");
        Ok(id)
    }

    pub fn set_face_outer_loop(&mut self, id: FaceId, outer_loop: LoopId) -> Result<(), KernelError> {
        let previous = self
            .faces
            .get(id)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })?
            .outer_loop;
        if !self.loops.contains_key(outer_loop) {
            return Err(KernelError::EntityNotFound { entity: outer_loop.into() });
        }
        if previous == outer_loop {
            return Ok(());
        }
        self.record(id.into(), EntityTransactionType::Modification);
        self.detach_loop(id, previous);
        self.attach_loop(id, outer_loop);
        if let Some(face) = self.faces.get_mut(id) {
            face.outer_loop = outer_loop;
        }
        propagate_dirty(self, id.into(), DirtyFlags::RESTORED);
        Ok(())
    }

    /// Replace a face's holes. Duplicates and the outer loop are dropped;
    /// loops leaving the face are detached from it.
    pub fn set_face_inner_loops(&mut self, id: FaceId, inner_loops: Vec<LoopId>) -> Result<(), KernelError> {
        let face = self
            .faces
            .get(id)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })?;
        let outer = face.outer_loop;
        let previous = face.inner_loops.clone();
        for &l in &inner_loops {
            if !self.loops.contains_key(l) {
                return Err(KernelError::EntityNotFound { entity: l.into() });
            }
        }
        let inner_loops = dedup_loops(inner_loops, outer);
        if previous == inner_loops {
            return Ok(());
        }

        self.record(id.into(), EntityTransactionType::Modification);
        for &l in previous.iter().filter(|l| !inner_loops.contains(l)) {
            self.detach_loop(id, l);
        }
        for &l in &inner_loops {
            self.attach_loop(id, l);
        }
        if let Some(face) = self.faces.get_mut(id) {
            face.inner_loops = inner_loops;
        }
        propagate_dirty(self, id.into(), DirtyFlags::RESTORED);
        Ok(())
    }

    fn attach_loop(&mut self, face: FaceId, l: LoopId) {
        if self.loops.get(l).is_some_and(|lp| lp.face == Some(face)) {
            return;
        }
        self.record(l.into(), EntityTransactionType::Modification);
        if let Some(lp) = self.loops.get_mut(l) {
            lp.face = Some(face);
        }
    }

    fn detach_loop(&mut self, face: FaceId, l: LoopId) {
        if !self.loops.get(l).is_some_and(|lp| lp.face == Some(face)) {
            return;
        }
        self.record(l.into(), EntityTransactionType::Modification);
        if let Some(lp) = self.loops.get_mut(l) {
            lp.face = None;
        }
    }

    pub fn set_flag(&mut self, entity: EntityRef, flag: EntityFlags, on: bool) -> Result<(), KernelError> {
        if !self.contains(entity) {
            return Err(KernelError::EntityNotFound { entity });
        }
        self.record(entity, EntityTransactionType::Modification);
        self.write_flags(entity, |flags| flags.set(flag, on));
        Ok(())
    }

    pub(crate) fn write_flags(&mut self, entity: EntityRef, f: impl FnOnce(&mut EntityFlags)) {
        match entity {
            EntityRef::Vertex(id) => {
                if let Some(v) = self.vertices.get_mut(id) {
                    f(&mut v.flags);
                }
            }
            EntityRef::Edge(id) => {
                if let Some(e) = self.edges.get_mut(id) {
                    f(&mut e.flags);
                }
            }
            EntityRef::CoEdge(id) => {
                if let Some(c) = self.coedges.get_mut(id) {
                    f(&mut c.flags);
                }
            }
            EntityRef::Loop(id) => {
                if let Some(l) = self.loops.get_mut(id) {
                    f(&mut l.flags);
                }
            }
            EntityRef::Face(id) => {
                if let Some(fc) = self.faces.get_mut(id) {
                    f(&mut fc.flags);
                }
            }
        }
    }

    // ── Removal ──────────────────────────────────────────────────────────

    fn soft_remove(&mut self, entity: EntityRef) {
        self.record(entity, EntityTransactionType::Modification);
        self.write_flags(entity, |flags| flags.insert(EntityFlags::REMOVED));
        trace!(%entity, "removed");
    }

    /// Detach a co-edge from its edge and owner loop and remove it.
    pub fn remove_coedge(&mut self, id: CoEdgeId) -> Result<(), KernelError> {
        let coedge = self
            .coedges
            .get(id)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })?;
        let (edge, owner) = (coedge.edge, coedge.owner);

        if self.edges.contains_key(edge) {
            self.record(edge.into(), EntityTransactionType::Modification);
            if let Some(e) = self.edges.get_mut(edge) {
                e.coedges.retain(|c| *c != id);
            }
        }
        if let Some(owner) = owner {
            if self.loops.get(owner).is_some_and(|l| l.coedges.contains(&id)) {
                self.record(owner.into(), EntityTransactionType::Modification);
                if let Some(l) = self.loops.get_mut(owner) {
                    l.coedges.retain(|c| *c != id);
                }
            }
        }
        self.soft_remove(id.into());
        if let Some(c) = self.coedges.get_mut(id) {
            c.owner = None;
        }
        Ok(())
    }

    /// Remove an edge that no co-edge uses any more. Returns false if it is
    /// still in use.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<bool, KernelError> {
        let edge = self
            .edges
            .get(id)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })?;
        if !edge.coedges.is_empty() {
            return Ok(false);
        }
        for v in [edge.start, edge.end] {
            if self.vertices.get(v).is_some_and(|vx| vx.edges.contains(&id)) {
                self.record(v.into(), EntityTransactionType::Modification);
                if let Some(vx) = self.vertices.get_mut(v) {
                    vx.edges.retain(|e| *e != id);
                }
            }
        }
        self.soft_remove(id.into());
        Ok(true)
    }

    /// Remove a vertex that no edge references any more. Returns false if it
    /// is still in use.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<bool, KernelError> {
        let vertex = self
            .vertices
            .get(id)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })?;
        if !vertex.edges.is_empty() {
            return Ok(false);
        }
        self.soft_remove(id.into());
        Ok(true)
    }

    /// Remove a loop after detaching it from its face.
    pub fn remove_loop(&mut self, id: LoopId) -> Result<(), KernelError> {
        let face = self
            .loops
            .get(id)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })?
            .face;
        if let Some(face) = face {
            self.detach_loop(face, id);
        }
        self.soft_remove(id.into());
        Ok(())
    }

    /// Remove a face. Its loops are left for the caller to release.
    pub fn remove_face(&mut self, id: FaceId) -> Result<(), KernelError> {
        if !self.faces.contains_key(id) {
            return Err(KernelError::EntityNotFound { entity: id.into() });
        }
        self.soft_remove(id.into());
        Ok(())
    }

    /// Free every slot flagged as removed. Call only once no history entry
    /// refers to those entities.
    pub fn purge_removed(&mut self) -> usize {
        let removed = |flags: EntityFlags| flags.contains(EntityFlags::REMOVED);
        let before = self.vertices.len()
            + self.edges.len()
            + self.coedges.len()
            + self.loops.len()
            + self.faces.len();
        self.vertices.retain(|_, v| !removed(v.flags));
        self.edges.retain(|_, e| !removed(e.flags));
        self.coedges.retain(|_, c| !removed(c.flags));
        self.loops.retain(|_, l| !removed(l.flags));
        self.faces.retain(|_, f| !removed(f.flags));
        let after = self.vertices.len()
            + self.edges.len()
            + self.coedges.len()
            + self.loops.len()
            + self.faces.len();
        debug!(purged = before - after, "purged removed entities");
        before - after
    }

    fn vertex_point(&self, id: VertexId) -> Result<Point3d, KernelError> {
        self.vertices
            .get(id)
            .map(|v| v.point)
            .ok_or(KernelError::EntityNotFound { entity: id.into() })
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Serialize the whole arena. Keys survive the round trip.
    pub fn to_json(&self) -> Result<String, KernelError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn dedup_loops(loops: Vec<LoopId>, outer: LoopId) -> Vec<LoopId> {
    let mut unique = Vec::with_capacity(loops.len());
    for l in loops {
        if l != outer && !unique.contains(&l) {
            unique.push(l);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_store_creation() {
        let store = EntityStore::new();
        assert_eq!(store.vertices().count(), 0);
        assert_eq!(store.edges().count(), 0);
        assert!(!store.is_recording());
    }

    #[test]
    fn test_add_edge_registers_parents() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(1.0, 0.0, 0.0));
        let e = store.add_edge(0, a, b, None).unwrap();
        assert_eq!(store.vertex(a).unwrap().edges, vec![e]);
        assert_eq!(store.parents(a.into()), vec![EntityRef::Edge(e)]);
        assert_eq!(store.edge(e).unwrap().curve.end_point(), Point3d::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_third_coedge_rejected() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(1.0, 0.0, 0.0));
        let e = store.add_edge(0, a, b, None).unwrap();
        store.add_coedge(e, false, false).unwrap();
        store.add_coedge(e, true, false).unwrap();
        assert_eq!(
            store.add_coedge(e, false, false),
            Err(KernelError::TooManyCoEdges { edge: e })
        );
    }

    #[test]
    fn test_remove_edge_in_use_is_refused() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(1.0, 0.0, 0.0));
        let e = store.add_edge(0, a, b, None).unwrap();
        let c = store.add_coedge(e, false, false).unwrap();
        assert!(!store.remove_edge(e).unwrap());
        assert!(!store.remove_vertex(a).unwrap());

        store.remove_coedge(c).unwrap();
        assert!(store.remove_edge(e).unwrap());
        assert!(store.remove_vertex(a).unwrap());
        assert!(!store.is_live(a.into()));
        assert!(store.contains(a.into()));

        assert_eq!(store.purge_removed(), 3);
        assert!(!store.contains(a.into()));
        assert!(store.is_live(b.into()));
    }

    #[test]
    fn test_double_begin_recording_fails() {
        let mut store = EntityStore::new();
        store.begin_recording().unwrap();
        assert_eq!(store.begin_recording(), Err(KernelError::TransactionAlreadyOpen));
        assert!(store.end_recording().is_ok());
        assert!(matches!(store.end_recording(), Err(KernelError::NoOpenTransaction)));
    }

    #[test]
    fn test_missing_vertex_errors() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        store.remove_vertex(a).unwrap();
        store.purge_removed();
        assert!(matches!(
            store.set_vertex_point(a, Point3d::ORIGIN),
            Err(KernelError::EntityNotFound { .. })
        ));
    }
}
