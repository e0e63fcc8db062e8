//! Upward dirty-flag propagation.
//!
//! A change to an entity invalidates everything built on top of it: a vertex
//! dirties its edges, an edge its co-edges, a co-edge its loop and a loop its
//! face. Propagation never goes downward.

use std::collections::{HashSet, VecDeque};

use brep_types::DirtyFlags;
use tracing::{instrument, trace};

use crate::topology::entity::EntityRef;
use crate::topology::store::{EdgeId, EntityStore};

/// Mark `origin` and all its ancestors with `flags`, breadth first, each
/// entity once. Returns the entities visited in order, `origin` first.
#[instrument(skip(store), level = "trace")]
pub fn propagate_dirty(store: &mut EntityStore, origin: EntityRef, flags: DirtyFlags) -> Vec<EntityRef> {
    if !store.contains(origin) {
        return Vec::new();
    }

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([origin]);
    visited.insert(origin);

    while let Some(entity) = queue.pop_front() {
        store.mark_dirty(entity, flags);
        order.push(entity);
        for parent in store.parents(entity) {
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    trace!(%origin, visited = order.len(), "propagated dirty flags");
    order
}

/// Refit the curve of every edge marked [`DirtyFlags::GEOMETRY`] to its
/// current vertices and clear that flag. Returns the refitted edges.
///
/// Curves are derived data, so the refit is not recorded.
pub fn refresh_geometry(store: &mut EntityStore) -> Vec<EdgeId> {
    let dirty: Vec<EdgeId> = store
        .edges()
        .filter(|(_, e)| e.dirty.contains(DirtyFlags::GEOMETRY))
        .map(|(id, _)| id)
        .collect();

    let mut refitted = Vec::new();
    for id in dirty {
        let Some(edge) = store.edge(id) else { continue };
        let start = store.vertex(edge.start).map(|v| v.point);
        let end = store.vertex(edge.end).map(|v| v.point);
        if let (Some(start), Some(end)) = (start, end) {
            if edge.curve.start_point() != start || edge.curve.end_point() != end {
                let curve = edge.curve.refit(start, end);
                if let Some(e) = store.edges.get_mut(id) {
                    e.curve = curve;
                }
                refitted.push(id);
            }
        }
        if let Some(e) = store.edges.get_mut(id) {
            e.dirty.remove(DirtyFlags::GEOMETRY);
        }
    }
    refitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::KernelContext;
    use crate::geometry::point::Point3d;
    use crate::topology::face::create_face;
    use crate::topology::loops::loop_vertices;

    fn square() -> Vec<Point3d> {
        vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(1.0, 1.0, 0.0),
            Point3d::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_vertex_dirties_up_to_face() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &square(), &[]).unwrap();
        store.clear_all_dirty();

        let outer = store.face(face).unwrap().outer_loop;
        let v = loop_vertices(&store, outer)[0];
        let visited = propagate_dirty(&mut store, v.into(), DirtyFlags::GEOMETRY);

        // vertex, 2 edges, 2 co-edges, loop, face
        assert_eq!(visited.len(), 7);
        assert_eq!(visited[0], EntityRef::Vertex(v));
        assert_eq!(*visited.last().unwrap(), EntityRef::Face(face));
        assert!(store.dirty(face.into()).contains(DirtyFlags::GEOMETRY));
        assert!(store.dirty(outer.into()).contains(DirtyFlags::GEOMETRY));
    }

    #[test]
    fn test_propagation_never_goes_down() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &square(), &[]).unwrap();
        store.clear_all_dirty();

        let outer = store.face(face).unwrap().outer_loop;
        let visited = propagate_dirty(&mut store, outer.into(), DirtyFlags::DISPLAY);
        assert_eq!(visited, vec![EntityRef::Loop(outer), EntityRef::Face(face)]);
        for v in loop_vertices(&store, outer) {
            assert!(store.dirty(v.into()).is_empty());
        }
    }

    #[test]
    fn test_refresh_geometry_refits_dirty_edges() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(1.0, 0.0, 0.0));
        let e = store.add_edge(0, a, b, None).unwrap();
        store.clear_all_dirty();

        store.set_vertex_point(b, Point3d::new(3.0, 0.0, 0.0)).unwrap();
        assert!(store.dirty(e.into()).contains(DirtyFlags::GEOMETRY));

        assert_eq!(refresh_geometry(&mut store), vec![e]);
        assert_eq!(store.edge(e).unwrap().curve.end_point(), Point3d::new(3.0, 0.0, 0.0));
        assert!(!store.dirty(e.into()).contains(DirtyFlags::GEOMETRY));
        assert!(refresh_geometry(&mut store).is_empty());
    }
}
