//! Face construction, queries and validation.

use brep_types::DirtyFlags;
use tracing::{debug, instrument, warn};

use super::loops::{create_loop_from_points, loop_points, loop_polygon, release_loop, verify_loop};
use super::store::{EntityStore, FaceId, LoopId, VertexId};
use crate::context::KernelContext;
use crate::error::KernelError;
use crate::geometry::bound::BoundingBox;
use crate::geometry::point::Point3d;
use crate::geometry::polygon::{is_clockwise, newell_normal, project_to_plane};
use crate::geometry::vector::Vec3;

/// Outline of a face for clipping: outer boundary counter-clockwise, holes
/// clockwise, both seen from the face's reference normal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipFacePolygon {
    pub outer: Option<Vec<Point3d>>,
    pub holes: Vec<Vec<Point3d>>,
}

/// Build a face from an outer ring and any number of hole rings.
#[instrument(skip_all, fields(outer = outer_points.len(), holes = inner_points.len()))]
pub fn create_face(
    store: &mut EntityStore,
    ctx: &mut KernelContext,
    outer_points: &[Point3d],
    inner_points: &[Vec<Point3d>],
) -> Result<FaceId, KernelError> {
    let outer = create_loop_from_points(store, ctx, outer_points)?;
    let mut inner = Vec::with_capacity(inner_points.len());
    for ring in inner_points {
        inner.push(create_loop_from_points(store, ctx, ring)?);
    }
    create_face_from_loops(store, outer, inner)
}

pub fn create_face_from_loops(
    store: &mut EntityStore,
    outer: LoopId,
    inner: Vec<LoopId>,
) -> Result<FaceId, KernelError> {
    store.add_face(outer, inner)
}

/// Points of the outer loop's vertices, in loop order.
pub fn outer_loop_vertices(store: &EntityStore, face: FaceId) -> Vec<Point3d> {
    store
        .face(face)
        .map(|f| loop_points(store, f.outer_loop))
        .unwrap_or_default()
}

pub fn outer_loop_polygon(store: &EntityStore, face: FaceId) -> Option<Vec<Point3d>> {
    let f = store.face(face)?;
    let polygon = loop_polygon(store, f.outer_loop);
    (!polygon.is_empty()).then_some(polygon)
}

/// Drop one hole from a face. Returns false if the loop is not a hole of
/// this face.
pub fn remove_inner_loop(store: &mut EntityStore, face: FaceId, loop_id: LoopId) -> Result<bool, KernelError> {
    let inner = store
        .face(face)
        .ok_or(KernelError::EntityNotFound { entity: face.into() })?
        .inner_loops
        .clone();
    if !inner.contains(&loop_id) {
        return Ok(false);
    }
    let remaining = inner.into_iter().filter(|l| *l != loop_id).collect();
    store.set_face_inner_loops(face, remaining)?;
    Ok(true)
}

/// Outer boundary and holes, oriented for polygon clipping.
///
/// The reference normal is the outer loop's Newell normal with its dominant
/// component made positive, so a floor face is read from above. Invalid holes
/// are skipped.
pub fn clip_face_polygon(store: &EntityStore, face: FaceId) -> ClipFacePolygon {
    let Some(f) = store.face(face) else {
        return ClipFacePolygon::default();
    };
    let Some(mut outer) = outer_loop_polygon(store, face) else {
        return ClipFacePolygon::default();
    };
    let Some(normal) = newell_normal(&outer).map(canonical_normal) else {
        return ClipFacePolygon {
            outer: Some(outer),
            holes: Vec::new(),
        };
    };

    if is_clockwise(&project_to_plane(&outer, &normal)) {
        outer.reverse();
    }

    let mut holes = Vec::with_capacity(f.inner_loops.len());
    for &l in &f.inner_loops {
        if !verify_loop(store, l) {
            continue;
        }
        let mut hole = loop_polygon(store, l);
        if hole.is_empty() {
            continue;
        }
        if !is_clockwise(&project_to_plane(&hole, &normal)) {
            hole.reverse();
        }
        holes.push(hole);
    }

    ClipFacePolygon {
        outer: Some(outer),
        holes,
    }
}

fn canonical_normal(n: Vec3) -> Vec3 {
    let dominant = if n.z.abs() >= n.x.abs() && n.z.abs() >= n.y.abs() {
        n.z
    } else if n.y.abs() >= n.x.abs() {
        n.y
    } else {
        n.x
    };
    if dominant < 0.0 { -n } else { n }
}

/// Visit every vertex of the outer loop, then of each hole in order.
pub fn for_each_vertex(store: &EntityStore, face: FaceId, mut f: impl FnMut(VertexId, &Point3d)) {
    let Some(fc) = store.face(face) else {
        return;
    };
    for l in std::iter::once(fc.outer_loop).chain(fc.inner_loops.iter().copied()) {
        for v in super::loops::loop_vertices(store, l) {
            if let Some(vertex) = store.vertex(v) {
                f(v, &vertex.point);
            }
        }
    }
}

/// Check a face and repair what can be repaired.
///
/// Fails when the face or its outer loop is unusable. Invalid holes are
/// dropped from the face.
pub fn verify_face(store: &mut EntityStore, face: FaceId) -> Result<bool, KernelError> {
    if !store.is_live(face.into()) {
        return Ok(false);
    }
    let Some(f) = store.face(face) else {
        return Ok(false);
    };
    let outer = f.outer_loop;
    let inner = f.inner_loops.clone();

    if !verify_loop(store, outer) || loop_polygon(store, outer).is_empty() {
        warn!(?face, ?outer, "face has an invalid outer loop");
        return Ok(false);
    }

    let (valid, invalid): (Vec<LoopId>, Vec<LoopId>) = inner
        .into_iter()
        .partition(|l| verify_loop(store, *l) && !loop_polygon(store, *l).is_empty());
    if !invalid.is_empty() {
        debug!(?face, dropped = invalid.len(), "dropping invalid inner loops");
        store.set_face_inner_loops(face, valid)?;
    }
    Ok(true)
}

/// Two hole lists are the same when they hold the same loops in the same
/// order.
pub fn is_same_inner_loops(a: &[LoopId], b: &[LoopId]) -> bool {
    a == b
}

/// Bounding box of the outer loop, recomputed only after the face was
/// invalidated.
pub fn face_bound(store: &mut EntityStore, face: FaceId) -> Option<BoundingBox> {
    let f = store.faces.get(face)?;
    if let Some(bound) = f.cached_bound {
        if !f.dirty.contains(DirtyFlags::BOUND) {
            return Some(bound);
        }
    }
    let points = outer_loop_vertices(store, face);
    let bound = BoundingBox::from_points(&points);
    let f = store.faces.get_mut(face)?;
    f.cached_bound = Some(bound);
    f.dirty.remove(DirtyFlags::BOUND);
    Some(bound)
}

/// Remove a face with all its loops.
pub fn release_face(store: &mut EntityStore, face: FaceId) -> Result<(), KernelError> {
    let f = store
        .face(face)
        .ok_or(KernelError::EntityNotFound { entity: face.into() })?;
    let loops: Vec<LoopId> = std::iter::once(f.outer_loop)
        .chain(f.inner_loops.iter().copied())
        .collect();
    store.set_face_inner_loops(face, Vec::new())?;
    for l in loops {
        release_loop(store, l)?;
    }
    store.remove_face(face)?;
    debug!(?face, "released face");
    Ok(())
}
