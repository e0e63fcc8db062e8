//! Loop construction and point-driven loop updates.

use tracing::{debug, instrument, trace};

use super::store::{CoEdgeId, EntityStore, LoopId, VertexId};
use crate::context::KernelContext;
use crate::error::KernelError;
use crate::geometry::curves::Curve;
use crate::geometry::point::Point3d;

/// Segments used to discretize a curved co-edge in [`loop_polygon`].
const CURVE_SEGMENTS: usize = 16;

/// Bring a loop's boundary in line with `points`.
///
/// With no loop (or a removed one) a new loop is created. When the vertex
/// count matches, vertices move in place and keep their identity along with
/// their edges and co-edges. Otherwise the old boundary is released and a new
/// chain is built inside the same loop.
#[instrument(skip(store, ctx, points), fields(count = points.len()))]
pub fn update_loop_by_points(
    store: &mut EntityStore,
    ctx: &mut KernelContext,
    loop_id: Option<LoopId>,
    points: &[Point3d],
) -> Result<LoopId, KernelError> {
    if points.len() < 3 {
        return Err(KernelError::DegenerateLoop {
            count: points.len(),
        });
    }

    let Some(loop_id) = loop_id.filter(|l| store.is_live((*l).into())) else {
        return create_loop_from_points(store, ctx, points);
    };

    let vertices = loop_vertices(store, loop_id);
    if vertices.len() == points.len() {
        let tol = ctx.config.tolerance;
        let mut moved = 0usize;
        for (&v, p) in vertices.iter().zip(points) {
            let Some(current) = store.vertex(v).map(|vx| vx.point) else {
                continue;
            };
            if !tol.points_coincident(&current, p) {
                store.set_vertex_point(v, *p)?;
                moved += 1;
            }
        }
        if moved > 0 {
            refit_loop_edges(store, loop_id)?;
        }
        debug!(?loop_id, moved, "updated loop in place");
        return Ok(loop_id);
    }

    release_boundary(store, loop_id)?;
    let vertices: Vec<VertexId> = points.iter().map(|p| store.add_vertex(*p)).collect();
    let coedges = build_chain(store, ctx, &vertices)?;
    store.set_loop_coedges(loop_id, coedges)?;
    debug!(?loop_id, vertices = vertices.len(), "rebuilt loop boundary");
    Ok(loop_id)
}

pub fn create_loop_from_points(
    store: &mut EntityStore,
    ctx: &mut KernelContext,
    points: &[Point3d],
) -> Result<LoopId, KernelError> {
    if points.len() < 3 {
        return Err(KernelError::DegenerateLoop {
            count: points.len(),
        });
    }
    let vertices: Vec<VertexId> = points.iter().map(|p| store.add_vertex(*p)).collect();
    create_loop_from_vertices(store, ctx, &vertices)
}

/// Close a loop through existing vertices. Vertex `i` connects to `i + 1`,
/// and the last back to the first.
pub fn create_loop_from_vertices(
    store: &mut EntityStore,
    ctx: &mut KernelContext,
    vertices: &[VertexId],
) -> Result<LoopId, KernelError> {
    if vertices.len() < 3 {
        return Err(KernelError::DegenerateLoop {
            count: vertices.len(),
        });
    }
    let coedges = build_chain(store, ctx, vertices)?;
    let id = store.add_loop(coedges)?;
    debug!(?id, vertices = vertices.len(), "created loop");
    Ok(id)
}

fn build_chain(
    store: &mut EntityStore,
    ctx: &mut KernelContext,
    vertices: &[VertexId],
) -> Result<Vec<CoEdgeId>, KernelError> {
    let n = vertices.len();
    let mut coedges = Vec::with_capacity(n);
    for i in 0..n {
        let edge = store.add_edge(ctx.ids.generate(), vertices[i], vertices[(i + 1) % n], None)?;
        coedges.push(store.add_coedge(edge, false, false)?);
    }
    Ok(coedges)
}

fn refit_loop_edges(store: &mut EntityStore, loop_id: LoopId) -> Result<(), KernelError> {
    let edges: Vec<_> = store
        .loop_data(loop_id)
        .map(|l| {
            l.coedges
                .iter()
                .filter_map(|c| store.coedge(*c).map(|co| co.edge))
                .collect()
        })
        .unwrap_or_default();
    for e in edges {
        let Some(edge) = store.edge(e) else { continue };
        let (Some(start), Some(end)) = (store.vertex(edge.start), store.vertex(edge.end)) else {
            continue;
        };
        if edge.curve.start_point() != start.point || edge.curve.end_point() != end.point {
            let curve = edge.curve.refit(start.point, end.point);
            store.set_edge_curve(e, curve)?;
        }
    }
    Ok(())
}

/// Start vertex of every co-edge, in loop order.
pub fn loop_vertices(store: &EntityStore, loop_id: LoopId) -> Vec<VertexId> {
    store
        .loop_data(loop_id)
        .map(|l| {
            l.coedges
                .iter()
                .filter_map(|c| store.coedge_start_vertex(*c))
                .collect()
        })
        .unwrap_or_default()
}

pub fn loop_points(store: &EntityStore, loop_id: LoopId) -> Vec<Point3d> {
    loop_vertices(store, loop_id)
        .into_iter()
        .filter_map(|v| store.vertex(v).map(|vx| vx.point))
        .collect()
}

/// Discretized boundary: vertices plus intermediate samples on curved edges.
pub fn loop_polygon(store: &EntityStore, loop_id: LoopId) -> Vec<Point3d> {
    let Some(l) = store.loop_data(loop_id) else {
        return Vec::new();
    };
    let mut polygon = Vec::new();
    for &c in &l.coedges {
        let Some(curve) = store.coedge_view(c).and_then(|view| view.to_math_curve()) else {
            continue;
        };
        let segments = match curve.curve() {
            Curve::Line(_) => 1,
            Curve::Arc(_) => CURVE_SEGMENTS,
        };
        let mut samples = curve.sample(segments);
        samples.pop();
        polygon.extend(samples);
    }
    polygon
}

/// Every co-edge ends where the next one starts.
pub fn is_loop_closed(store: &EntityStore, loop_id: LoopId) -> bool {
    let Some(l) = store.loop_data(loop_id) else {
        return false;
    };
    let n = l.coedges.len();
    if n == 0 {
        return false;
    }
    (0..n).all(|i| {
        let end = store.coedge_end_vertex(l.coedges[i]);
        let next = store.coedge_start_vertex(l.coedges[(i + 1) % n]);
        end.is_some() && end == next
    })
}

/// A loop is usable when it is live, closed, and owns all its co-edges.
pub fn verify_loop(store: &EntityStore, loop_id: LoopId) -> bool {
    if !store.is_live(loop_id.into()) {
        return false;
    }
    let Some(l) = store.loop_data(loop_id) else {
        return false;
    };
    let owned = l.coedges.iter().all(|c| {
        store.is_live((*c).into()) && store.coedge(*c).is_some_and(|co| co.owner == Some(loop_id))
    });
    owned && is_loop_closed(store, loop_id)
}

/// Remove a loop together with the parts of its boundary nothing else uses.
pub fn release_loop(store: &mut EntityStore, loop_id: LoopId) -> Result<(), KernelError> {
    release_boundary(store, loop_id)?;
    store.remove_loop(loop_id)?;
    debug!(?loop_id, "released loop");
    Ok(())
}

/// Co-edges first, then edges left without co-edges, then vertices left
/// without edges.
fn release_boundary(store: &mut EntityStore, loop_id: LoopId) -> Result<(), KernelError> {
    let coedges = store
        .loop_data(loop_id)
        .map(|l| l.coedges.clone())
        .unwrap_or_default();

    let mut edges = Vec::with_capacity(coedges.len());
    for c in coedges {
        if let Some(co) = store.coedge(c) {
            edges.push(co.edge);
        }
        store.remove_coedge(c)?;
    }

    let mut vertices = Vec::with_capacity(edges.len() * 2);
    for e in edges {
        let Some(edge) = store.edge(e) else { continue };
        let ends = [edge.start, edge.end];
        if store.remove_edge(e)? {
            vertices.extend(ends);
        }
    }

    for v in vertices {
        if store.is_live(v.into()) && store.remove_vertex(v)? {
            trace!(?v, "released vertex");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brep_types::EntityKind;

    fn square() -> Vec<Point3d> {
        vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(4.0, 0.0, 0.0),
            Point3d::new(4.0, 4.0, 0.0),
            Point3d::new(0.0, 4.0, 0.0),
        ]
    }

    #[test]
    fn test_create_loop_from_points() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let l = update_loop_by_points(&mut store, &mut ctx, None, &square()).unwrap();
        assert_eq!(loop_points(&store, l), square());
        assert!(is_loop_closed(&store, l));
        assert!(verify_loop(&store, l));
        assert_eq!(store.live_count(EntityKind::Edge), 4);
        assert_eq!(ctx.ids.peek(), 4);
    }

    #[test]
    fn test_degenerate_input_rejected() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let pts = &square()[..2];
        assert_eq!(
            update_loop_by_points(&mut store, &mut ctx, None, pts),
            Err(KernelError::DegenerateLoop { count: 2 })
        );
    }

    #[test]
    fn test_same_count_moves_in_place() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let l = update_loop_by_points(&mut store, &mut ctx, None, &square()).unwrap();
        let before = loop_vertices(&store, l);
        let coedges_before = store.loop_data(l).unwrap().coedges.clone();

        let moved: Vec<Point3d> = square().iter().map(|p| Point3d::new(p.x * 2.0, p.y, p.z)).collect();
        let same = update_loop_by_points(&mut store, &mut ctx, Some(l), &moved).unwrap();
        assert_eq!(same, l);
        assert_eq!(loop_vertices(&store, l), before);
        assert_eq!(store.loop_data(l).unwrap().coedges, coedges_before);
        assert_eq!(loop_points(&store, l), moved);

        let first_edge = store.coedge(coedges_before[0]).unwrap().edge;
        assert_eq!(store.edge(first_edge).unwrap().curve.end_point(), Point3d::new(8.0, 0.0, 0.0));
    }

    #[test]
    fn test_count_change_rebuilds_in_same_loop() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let l = update_loop_by_points(&mut store, &mut ctx, None, &square()).unwrap();
        let tri = vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(0.0, 1.0, 0.0),
        ];
        let same = update_loop_by_points(&mut store, &mut ctx, Some(l), &tri).unwrap();
        assert_eq!(same, l);
        assert_eq!(loop_points(&store, l), tri);
        assert!(verify_loop(&store, l));
        assert_eq!(store.live_count(EntityKind::Vertex), 3);
        assert_eq!(store.live_count(EntityKind::Edge), 3);
        assert_eq!(store.live_count(EntityKind::CoEdge), 3);
    }

    #[test]
    fn test_release_loop() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let l = create_loop_from_points(&mut store, &mut ctx, &square()).unwrap();
        release_loop(&mut store, l).unwrap();
        assert!(!store.is_live(l.into()));
        assert_eq!(store.live_count(EntityKind::Vertex), 0);
        assert_eq!(store.live_count(EntityKind::CoEdge), 0);
    }

    #[test]
    fn test_removed_loop_is_replaced() {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let l = create_loop_from_points(&mut store, &mut ctx, &square()).unwrap();
        release_loop(&mut store, l).unwrap();
        let fresh = update_loop_by_points(&mut store, &mut ctx, Some(l), &square()).unwrap();
        assert_ne!(fresh, l);
    }
}
