//! Directed uses of edges and their persistent names.

use brep_types::{EntityFlags, decode_topo_name, encode_coedge_topo_name, encode_topo_name};
use tracing::debug;

use super::store::{CoEdge, CoEdgeId, Edge, EdgeId, EntityStore};
use crate::geometry::curves::MathCurve;

/// Read-only view of one co-edge in a store.
#[derive(Debug, Clone, Copy)]
pub struct CoEdgeView<'a> {
    store: &'a EntityStore,
    id: CoEdgeId,
}

impl<'a> CoEdgeView<'a> {
    /// `None` if `id` is not in the store.
    pub fn new(store: &'a EntityStore, id: CoEdgeId) -> Option<Self> {
        store.coedge(id)?;
        Some(Self { store, id })
    }

    pub fn id(&self) -> CoEdgeId {
        self.id
    }

    fn data(&self) -> Option<&'a CoEdge> {
        self.store.coedge(self.id)
    }

    pub fn is_rev(&self) -> bool {
        self.data().is_some_and(|c| c.is_rev)
    }

    pub fn is_extraordinary(&self) -> bool {
        self.data().is_some_and(|c| c.extraordinary)
    }

    pub fn edge_id(&self) -> Option<EdgeId> {
        self.data().map(|c| c.edge)
    }

    pub fn edge(&self) -> Option<&'a Edge> {
        self.store.edge(self.data()?.edge)
    }

    /// The co-edge on the other side of this one's edge.
    ///
    /// Returns the first partner that is not this co-edge, or `None` when the
    /// edge is one-sided.
    pub fn another(&self) -> Option<CoEdgeId> {
        self.edge()?
            .coedges
            .iter()
            .copied()
            .find(|c| *c != self.id)
    }

    /// Persistent name of this co-edge.
    ///
    /// Plain co-edges use `"<edge name>_<is_rev>"`, where the edge name falls
    /// back to its persistent id. Extraordinary co-edges use
    /// `"<persistent id>_<edge name|null>_<is_rev>"`.
    pub fn topo_name(&self) -> Option<String> {
        let coedge = self.data()?;
        let edge = self.store.edge(coedge.edge)?;
        Some(if coedge.extraordinary {
            encode_topo_name(edge.persistent_id, edge.topo_name.as_deref(), coedge.is_rev)
        } else {
            encode_coedge_topo_name(&edge.name(), coedge.is_rev)
        })
    }

    /// The edge's curve in this co-edge's direction of travel.
    pub fn to_math_curve(&self) -> Option<MathCurve<'a>> {
        let coedge = self.data()?;
        let curve = self.store.edge(coedge.edge)?.curve.to_math_curve();
        Some(if coedge.is_rev { curve.reversed() } else { curve })
    }
}

impl EntityStore {
    pub fn coedge_view(&self, id: CoEdgeId) -> Option<CoEdgeView<'_>> {
        CoEdgeView::new(self, id)
    }
}

/// Resolve a persisted co-edge name.
///
/// Names computed from live co-edges are matched exactly first. Otherwise the
/// name is decoded and matched on edge id, then edge name, then orientation.
/// Stale, malformed and background names resolve to `None`.
pub fn find_coedge_by_topo_name(store: &EntityStore, name: &str) -> Option<CoEdgeId> {
    let live = |c: &CoEdge| !c.flags.contains(EntityFlags::REMOVED);

    let exact = store
        .coedges()
        .filter(|(_, c)| live(*c))
        .find(|(id, _)| {
            store
                .coedge_view(*id)
                .and_then(|view| view.topo_name())
                .is_some_and(|n| n == name)
        })
        .map(|(id, _)| id);
    if exact.is_some() {
        return exact;
    }

    let decoded = decode_topo_name(name);
    if decoded.is_background() {
        debug!(topo_name = name, "background topology name has no co-edge");
        return None;
    }
    let Some(edge_id) = decoded.edge_id else {
        debug!(topo_name = name, "topology name has no usable edge id");
        return None;
    };

    let found = store
        .coedges()
        .filter(|(_, c)| live(*c) && c.is_rev == decoded.is_rev)
        .find(|(_, c)| {
            store.edge(c.edge).is_some_and(|e| {
                e.persistent_id == edge_id && e.topo_name == decoded.edge_topo_name
            })
        })
        .map(|(id, _)| id);
    if found.is_none() {
        debug!(topo_name = name, "stale topology name");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;

    fn two_sided_edge(store: &mut EntityStore) -> (EdgeId, CoEdgeId, CoEdgeId) {
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(2.0, 0.0, 0.0));
        let e = store.add_edge(17, a, b, None).unwrap();
        let fwd = store.add_coedge(e, false, false).unwrap();
        let rev = store.add_coedge(e, true, true).unwrap();
        (e, fwd, rev)
    }

    #[test]
    fn test_another_finds_partner() {
        let mut store = EntityStore::new();
        let (_, fwd, rev) = two_sided_edge(&mut store);
        assert_eq!(store.coedge_view(fwd).unwrap().another(), Some(rev));
        assert_eq!(store.coedge_view(rev).unwrap().another(), Some(fwd));
    }

    #[test]
    fn test_another_one_sided_is_none() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(1.0, 0.0, 0.0));
        let e = store.add_edge(0, a, b, None).unwrap();
        let c = store.add_coedge(e, false, false).unwrap();
        assert_eq!(store.coedge_view(c).unwrap().another(), None);
    }

    #[test]
    fn test_topo_names() {
        let mut store = EntityStore::new();
        let (e, fwd, rev) = two_sided_edge(&mut store);
        assert_eq!(store.coedge_view(fwd).unwrap().topo_name().unwrap(), "17_false");
        assert_eq!(store.coedge_view(rev).unwrap().topo_name().unwrap(), "17_null_true");

        store.set_edge_topo_name(e, Some("wall".into())).unwrap();
        assert_eq!(store.coedge_view(fwd).unwrap().topo_name().unwrap(), "wall_false");
        assert_eq!(store.coedge_view(rev).unwrap().topo_name().unwrap(), "17_wall_true");
    }

    #[test]
    fn test_math_curve_follows_orientation() {
        let mut store = EntityStore::new();
        let (_, fwd, rev) = two_sided_edge(&mut store);
        let f = store.coedge_view(fwd).unwrap().to_math_curve().unwrap();
        let r = store.coedge_view(rev).unwrap().to_math_curve().unwrap();
        assert_eq!(f.start_point(), Point3d::ORIGIN);
        assert_eq!(r.start_point(), Point3d::new(2.0, 0.0, 0.0));
        assert_eq!(r.reversed(), f);
    }

    #[test]
    fn test_find_by_topo_name() {
        let mut store = EntityStore::new();
        let (_, fwd, rev) = two_sided_edge(&mut store);
        assert_eq!(find_coedge_by_topo_name(&store, "17_false"), Some(fwd));
        assert_eq!(find_coedge_by_topo_name(&store, "17_null_true"), Some(rev));
        assert_eq!(find_coedge_by_topo_name(&store, "99_null_true"), None);
        assert_eq!(find_coedge_by_topo_name(&store, "garbage"), None);
        assert_eq!(find_coedge_by_topo_name(&store, "background"), None);
    }
}
