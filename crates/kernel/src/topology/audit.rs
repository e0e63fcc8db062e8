use brep_types::EntityFlags;
use tracing::{info, instrument, warn};

use super::loops::is_loop_closed;
use super::store::{CoEdgeId, EdgeId, EntityStore, FaceId, LoopId, VertexId};

/// Result of checking the whole store against its structural invariants.
#[derive(Debug, Clone, Default)]
pub struct TopologyAudit {
    pub coedges_consistent: bool,
    pub all_loops_closed: bool,
    pub faces_consistent: bool,
    pub no_dangling_vertices: bool,
    pub errors: Vec<TopologyError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    CoEdgeCountOutOfRange {
        edge: EdgeId,
        count: usize,
    },
    /// Both co-edges of an edge run the same way.
    CoEdgeOrientationClash {
        edge: EdgeId,
    },
    CoEdgeBackPointerMismatch {
        coedge: CoEdgeId,
        edge: EdgeId,
    },
    OpenLoop {
        loop_id: LoopId,
    },
    LoopFaceMismatch {
        loop_id: LoopId,
        face: FaceId,
    },
    DuplicateInnerLoop {
        face: FaceId,
        loop_id: LoopId,
    },
    InnerLoopIsOuter {
        face: FaceId,
        loop_id: LoopId,
    },
    DanglingVertex {
        vertex: VertexId,
    },
}

impl TopologyAudit {
    pub fn all_valid(&self) -> bool {
        self.coedges_consistent
            && self.all_loops_closed
            && self.faces_consistent
            && self.no_dangling_vertices
    }
}

fn removed(flags: EntityFlags) -> bool {
    flags.contains(EntityFlags::REMOVED)
}

/// Audit every live entity in the store.
#[instrument(skip(store))]
pub fn audit_store(store: &EntityStore) -> TopologyAudit {
    let mut errors = Vec::new();
    let mut coedges_consistent = true;
    let mut all_loops_closed = true;
    let mut faces_consistent = true;
    let mut no_dangling_vertices = true;

    for (edge_id, edge) in store.edges().filter(|(_, e)| !removed(e.flags)) {
        let live: Vec<CoEdgeId> = edge
            .coedges
            .iter()
            .copied()
            .filter(|c| store.is_live((*c).into()))
            .collect();
        if live.len() > 2 {
            coedges_consistent = false;
            errors.push(TopologyError::CoEdgeCountOutOfRange {
                edge: edge_id,
                count: live.len(),
            });
        }
        if let [a, b] = live[..] {
            let rev = |c| store.coedge(c).map(|co| co.is_rev);
            if rev(a) == rev(b) {
                coedges_consistent = false;
                errors.push(TopologyError::CoEdgeOrientationClash { edge: edge_id });
            }
        }
        for c in live {
            if store.coedge(c).is_some_and(|co| co.edge != edge_id) {
                coedges_consistent = false;
                errors.push(TopologyError::CoEdgeBackPointerMismatch {
                    coedge: c,
                    edge: edge_id,
                });
            }
        }
    }

    for (coedge_id, coedge) in store.coedges().filter(|(_, c)| !removed(c.flags)) {
        let listed = store
            .edge(coedge.edge)
            .is_some_and(|e| e.coedges.contains(&coedge_id));
        if !listed {
            coedges_consistent = false;
            errors.push(TopologyError::CoEdgeBackPointerMismatch {
                coedge: coedge_id,
                edge: coedge.edge,
            });
        }
    }

    for (loop_id, _) in store.loops().filter(|(_, l)| !removed(l.flags)) {
        if !is_loop_closed(store, loop_id) {
            all_loops_closed = false;
            errors.push(TopologyError::OpenLoop { loop_id });
        }
    }

    for (face_id, face) in store.live_faces() {
        let mut seen = Vec::with_capacity(face.inner_loops.len());
        for &l in std::iter::once(&face.outer_loop).chain(&face.inner_loops) {
            if store.loop_data(l).and_then(|lp| lp.face) != Some(face_id) {
                faces_consistent = false;
                errors.push(TopologyError::LoopFaceMismatch {
                    loop_id: l,
                    face: face_id,
                });
            }
        }
        for &l in &face.inner_loops {
            if l == face.outer_loop {
                faces_consistent = false;
                errors.push(TopologyError::InnerLoopIsOuter {
                    face: face_id,
                    loop_id: l,
                });
            } else if seen.contains(&l) {
                faces_consistent = false;
                errors.push(TopologyError::DuplicateInnerLoop {
                    face: face_id,
                    loop_id: l,
                });
            }
            seen.push(l);
        }
    }

    for (vertex_id, vertex) in store.vertices().filter(|(_, v)| !removed(v.flags)) {
        if !vertex.edges.iter().any(|e| store.is_live((*e).into())) {
            no_dangling_vertices = false;
            errors.push(TopologyError::DanglingVertex { vertex: vertex_id });
        }
    }

    let audit = TopologyAudit {
        coedges_consistent,
        all_loops_closed,
        faces_consistent,
        no_dangling_vertices,
        errors,
    };
    info!(
        coedges_consistent,
        all_loops_closed,
        faces_consistent,
        no_dangling_vertices,
        error_count = audit.errors.len(),
        "topology audit complete"
    );
    audit
}

/// Log every violation found by [`audit_store`] and return the audit.
pub fn audit_and_report(store: &EntityStore) -> TopologyAudit {
    let audit = audit_store(store);
    for error in &audit.errors {
        warn!(?error, "topology violation");
    }
    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::KernelContext;
    use crate::geometry::point::Point3d;
    use crate::topology::face::create_face;
    use crate::topology::store::CoEdge;
    use brep_types::DirtyFlags;

    fn square(x0: f64, size: f64) -> Vec<Point3d> {
        vec![
            Point3d::new(x0, 0.0, 0.0),
            Point3d::new(x0 + size, 0.0, 0.0),
            Point3d::new(x0 + size, size, 0.0),
            Point3d::new(x0, size, 0.0),
        ]
    }

    #[test]
    fn test_clean_face_passes() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        create_face(&mut store, &mut ctx, &square(0.0, 10.0), &[square(2.0, 1.0)]).unwrap();
        let audit = audit_store(&store);
        assert!(audit.all_valid(), "{:?}", audit.errors);
    }

    #[test]
    fn test_three_coedges_reported() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(1.0, 0.0, 0.0));
        let e = store.add_edge(0, a, b, None).unwrap();
        store.add_coedge(e, false, false).unwrap();
        store.add_coedge(e, true, false).unwrap();
        let extra = store.coedges.insert(CoEdge {
            edge: e,
            is_rev: false,
            extraordinary: false,
            owner: None,
            flags: EntityFlags::empty(),
            dirty: DirtyFlags::empty(),
        });
        store.edges[e].coedges.push(extra);

        let audit = audit_store(&store);
        assert!(!audit.coedges_consistent);
        assert!(audit
            .errors
            .contains(&TopologyError::CoEdgeCountOutOfRange { edge: e, count: 3 }));
    }

    #[test]
    fn test_orientation_clash_reported() {
        let mut store = EntityStore::new();
        let a = store.add_vertex(Point3d::ORIGIN);
        let b = store.add_vertex(Point3d::new(1.0, 0.0, 0.0));
        let e = store.add_edge(0, a, b, None).unwrap();
        store.add_coedge(e, false, false).unwrap();
        store.add_coedge(e, false, false).unwrap();
        let audit = audit_store(&store);
        assert!(audit.errors.contains(&TopologyError::CoEdgeOrientationClash { edge: e }));
    }

    #[test]
    fn test_duplicate_inner_loop_reported() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &square(0.0, 10.0), &[square(2.0, 1.0)]).unwrap();
        let hole = store.faces[face].inner_loops[0];
        store.faces[face].inner_loops.push(hole);

        let audit = audit_store(&store);
        assert!(!audit.faces_consistent);
        assert!(audit
            .errors
            .contains(&TopologyError::DuplicateInnerLoop { face, loop_id: hole }));
    }

    #[test]
    fn test_dangling_vertex_reported() {
        let mut store = EntityStore::new();
        let v = store.add_vertex(Point3d::ORIGIN);
        let audit = audit_and_report(&store);
        assert!(!audit.no_dangling_vertices);
        assert_eq!(audit.errors, vec![TopologyError::DanglingVertex { vertex: v }]);
    }
}
