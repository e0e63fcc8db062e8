//! Reconciling an isolated face against fresh boundary points.

use tracing::{debug, instrument, trace};

use super::loops::{loop_vertices, release_loop, update_loop_by_points};
use super::store::{EntityStore, FaceId, LoopId};
use crate::context::KernelContext;
use crate::error::KernelError;
use crate::geometry::point::Point3d;

/// Update a face's outer loop and holes from point rings, reusing existing
/// loops where possible.
///
/// The outer loop is updated first. Each inner ring, in input order, takes
/// the first remaining hole with the same vertex count, or else the first
/// remaining hole of any count, or else a new loop. Holes left unmatched are
/// released.
///
/// Every ring is checked before anything is touched, so a degenerate ring
/// leaves the store unchanged.
#[instrument(skip_all, fields(face = ?face, holes = inner_points_array.len()))]
pub fn update_isolate_face(
    store: &mut EntityStore,
    ctx: &mut KernelContext,
    face: FaceId,
    outer_points: &[Point3d],
    inner_points_array: &[Vec<Point3d>],
) -> Result<(), KernelError> {
    let f = store
        .face(face)
        .ok_or(KernelError::EntityNotFound { entity: face.into() })?;
    if let Some(ring) = std::iter::once(outer_points)
        .chain(inner_points_array.iter().map(Vec::as_slice))
        .find(|ring| ring.len() < 3)
    {
        return Err(KernelError::DegenerateLoop { count: ring.len() });
    }
    let outer = f.outer_loop;
    let mut existing: Vec<LoopId> = f.inner_loops.clone();

    let outer_result = update_loop_by_points(store, ctx, Some(outer), outer_points)?;
    store.set_face_outer_loop(face, outer_result)?;

    let mut new_inner = Vec::with_capacity(inner_points_array.len());
    for ring in inner_points_array {
        let matched = existing
            .iter()
            .position(|l| loop_vertices(store, *l).len() == ring.len())
            .or_else(|| (!existing.is_empty()).then_some(0))
            .map(|i| existing.remove(i));
        trace!(?matched, count = ring.len(), "matched inner ring");

        let result = update_loop_by_points(store, ctx, matched, ring)?;
        new_inner.push(result);
    }

    store.set_face_inner_loops(face, new_inner)?;
    for l in existing {
        if store.is_live(l.into()) {
            release_loop(store, l)?;
        }
    }
    debug!(?face, "reconciled face");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::face::create_face;
    use crate::topology::loops::loop_points;
    use brep_types::EntityKind;

    fn polygon(n: usize, cx: f64, cy: f64, r: f64) -> Vec<Point3d> {
        (0..n)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / n as f64;
                Point3d::new(cx + r * a.cos(), cy + r * a.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn test_outer_and_single_hole_keep_ids() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &polygon(4, 0.0, 0.0, 10.0), &[polygon(4, 0.0, 0.0, 1.0)])
            .unwrap();
        let outer = store.face(face).unwrap().outer_loop;
        let hole = store.face(face).unwrap().inner_loops[0];

        let new_outer = polygon(4, 0.0, 0.0, 12.0);
        let new_hole = polygon(4, 1.0, 1.0, 1.0);
        update_isolate_face(&mut store, &mut ctx, face, &new_outer, &[new_hole.clone()]).unwrap();

        let f = store.face(face).unwrap();
        assert_eq!(f.outer_loop, outer);
        assert_eq!(f.inner_loops, vec![hole]);
        assert_eq!(loop_points(&store, outer), new_outer);
        assert_eq!(loop_points(&store, hole), new_hole);
    }

    #[test]
    fn test_holes_match_by_vertex_count() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(
            &mut store,
            &mut ctx,
            &polygon(4, 0.0, 0.0, 20.0),
            &[polygon(3, -5.0, 0.0, 1.0), polygon(5, 5.0, 0.0, 1.0)],
        )
        .unwrap();
        let tri = store.face(face).unwrap().inner_loops[0];
        let pent = store.face(face).unwrap().inner_loops[1];

        update_isolate_face(
            &mut store,
            &mut ctx,
            face,
            &polygon(4, 0.0, 0.0, 20.0),
            &[polygon(5, -5.0, 0.0, 2.0), polygon(3, 5.0, 0.0, 2.0)],
        )
        .unwrap();

        assert_eq!(store.face(face).unwrap().inner_loops, vec![pent, tri]);
        assert_eq!(loop_vertices(&store, pent).len(), 5);
        assert_eq!(loop_vertices(&store, tri).len(), 3);
    }

    #[test]
    fn test_fallback_and_new_holes() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &polygon(4, 0.0, 0.0, 20.0), &[polygon(3, 0.0, 0.0, 1.0)])
            .unwrap();
        let tri = store.face(face).unwrap().inner_loops[0];

        update_isolate_face(
            &mut store,
            &mut ctx,
            face,
            &polygon(4, 0.0, 0.0, 20.0),
            &[polygon(6, -5.0, 0.0, 1.0), polygon(4, 5.0, 0.0, 1.0)],
        )
        .unwrap();

        let inner = store.face(face).unwrap().inner_loops.clone();
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[0], tri);
        assert_eq!(loop_vertices(&store, tri).len(), 6);
        assert_eq!(loop_vertices(&store, inner[1]).len(), 4);
        assert_eq!(store.loop_data(inner[1]).unwrap().face, Some(face));
    }

    #[test]
    fn test_unmatched_holes_are_released() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(
            &mut store,
            &mut ctx,
            &polygon(4, 0.0, 0.0, 20.0),
            &[polygon(3, -5.0, 0.0, 1.0), polygon(3, 5.0, 0.0, 1.0)],
        )
        .unwrap();
        let second = store.face(face).unwrap().inner_loops[1];

        update_isolate_face(&mut store, &mut ctx, face, &polygon(4, 0.0, 0.0, 20.0), &[polygon(3, 0.0, 0.0, 1.0)])
            .unwrap();

        assert_eq!(store.face(face).unwrap().inner_loops.len(), 1);
        assert!(!store.is_live(second.into()));
        assert_eq!(store.live_count(EntityKind::Loop), 2);
        assert_eq!(store.live_count(EntityKind::Vertex), 7);
    }

    #[test]
    fn test_degenerate_outer_fails() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &polygon(4, 0.0, 0.0, 20.0), &[]).unwrap();
        let result = update_isolate_face(&mut store, &mut ctx, face, &polygon(4, 0.0, 0.0, 20.0)[..2], &[]);
        assert_eq!(result, Err(KernelError::DegenerateLoop { count: 2 }));
    }

    #[test]
    fn test_degenerate_hole_leaves_face_untouched() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let outer_points = polygon(4, 0.0, 0.0, 10.0);
        let face = create_face(&mut store, &mut ctx, &outer_points, &[]).unwrap();
        let outer = store.face(face).unwrap().outer_loop;
        let loops_before = store.live_count(EntityKind::Loop);
        let vertices_before = store.live_count(EntityKind::Vertex);

        let result = update_isolate_face(
            &mut store,
            &mut ctx,
            face,
            &polygon(4, 0.0, 0.0, 20.0),
            &[polygon(4, 1.0, 1.0, 1.0), polygon(4, 3.0, 1.0, 1.0)[..2].to_vec()],
        );

        assert_eq!(result, Err(KernelError::DegenerateLoop { count: 2 }));
        assert_eq!(loop_points(&store, outer), outer_points);
        assert_eq!(store.live_count(EntityKind::Loop), loops_before);
        assert_eq!(store.live_count(EntityKind::Vertex), vertices_before);
        assert!(store.face(face).unwrap().inner_loops.is_empty());
        assert!(store.loops().all(|(_, l)| l.face.is_some()));
    }
}
