//! Property-based tests for reconciliation and history invariants.

use proptest::prelude::*;

use brep_kernel::geometry::point::Point3d;
use brep_kernel::topology::face::create_face;
use brep_kernel::topology::loops::{is_loop_closed, loop_points, loop_vertices};
use brep_kernel::{update_isolate_face, EntityStore, KernelContext, TransactionManager};
use brep_types::EntityKind;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Regular polygon with `n` vertices around `(cx, cy)`.
fn ring(n: usize, cx: f64, cy: f64, r: f64) -> Vec<Point3d> {
    (0..n)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / n as f64;
            Point3d::new(cx + r * a.cos(), cy + r * a.sin(), 0.0)
        })
        .collect()
}

fn rings(counts: &[usize], r: f64) -> Vec<Vec<Point3d>> {
    counts
        .iter()
        .enumerate()
        .map(|(i, &n)| ring(n, -40.0 + 10.0 * i as f64, 0.0, r))
        .collect()
}

fn outer(n: usize) -> Vec<Point3d> {
    ring(n, 0.0, 0.0, 100.0)
}

/// Distinct vertex counts, in a random order.
fn arb_distinct_counts() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    prop::sample::subsequence((3usize..10).collect::<Vec<_>>(), 1..6)
        .prop_flat_map(|counts| (Just(counts.clone()), Just(counts).prop_shuffle()))
}

fn arb_counts() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(3usize..8, 0..6)
}

// ---------------------------------------------------------------------------
// 1. Holes with distinct vertex counts follow their count through a shuffle
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn holes_follow_vertex_count((original, shuffled) in arb_distinct_counts()) {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &outer(4), &rings(&original, 1.0)).unwrap();
        let before = store.face(face).unwrap().inner_loops.clone();

        update_isolate_face(&mut store, &mut ctx, face, &outer(4), &rings(&shuffled, 2.0)).unwrap();

        let after = store.face(face).unwrap().inner_loops.clone();
        prop_assert_eq!(after.len(), shuffled.len());
        for (i, n) in shuffled.iter().enumerate() {
            let j = original.iter().position(|m| m == n).unwrap();
            prop_assert_eq!(after[i], before[j]);
            prop_assert_eq!(loop_vertices(&store, after[i]).len(), *n);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Hole count and live loop count follow the input ring count
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn hole_count_is_conserved(initial in arb_counts(), updated in arb_counts()) {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &outer(4), &rings(&initial, 1.0)).unwrap();

        update_isolate_face(&mut store, &mut ctx, face, &outer(4), &rings(&updated, 1.5)).unwrap();

        let inner = store.face(face).unwrap().inner_loops.clone();
        prop_assert_eq!(inner.len(), updated.len());
        prop_assert_eq!(store.live_count(EntityKind::Loop), 1 + updated.len());
        for (l, n) in inner.iter().zip(&updated) {
            prop_assert_eq!(loop_vertices(&store, *l).len(), *n);
            prop_assert!(is_loop_closed(&store, *l));
        }
    }
}

// ---------------------------------------------------------------------------
// 3. The outer loop always takes the new point count and keeps its id
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn outer_loop_matches_points(first in 3usize..12, second in 3usize..12) {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let face = create_face(&mut store, &mut ctx, &outer(first), &[]).unwrap();
        let outer_loop = store.face(face).unwrap().outer_loop;

        update_isolate_face(&mut store, &mut ctx, face, &outer(second), &[]).unwrap();

        prop_assert_eq!(store.face(face).unwrap().outer_loop, outer_loop);
        prop_assert_eq!(loop_points(&store, outer_loop), outer(second));
    }
}

// ---------------------------------------------------------------------------
// 4. Undo after any reconciliation restores the original boundary
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn undo_restores_reconciled_face(initial in arb_counts(), updated in arb_counts(), sides in 3usize..8) {
        let mut store = EntityStore::new();
        let mut ctx = KernelContext::default();
        let mut manager = TransactionManager::new(&ctx.config);
        let face = create_face(&mut store, &mut ctx, &outer(4), &rings(&initial, 1.0)).unwrap();
        let inner_before = store.face(face).unwrap().inner_loops.clone();
        let points_before: Vec<_> = inner_before.iter().map(|l| loop_points(&store, *l)).collect();

        manager.start(&mut store, "reshape").unwrap();
        update_isolate_face(&mut store, &mut ctx, face, &outer(sides), &rings(&updated, 2.0)).unwrap();
        manager.commit(&mut store).unwrap();
        manager.undo(&mut store).unwrap();

        let f = store.face(face).unwrap();
        prop_assert_eq!(&f.inner_loops, &inner_before);
        prop_assert_eq!(loop_points(&store, f.outer_loop), outer(4));
        for (l, pts) in inner_before.iter().zip(&points_before) {
            prop_assert_eq!(&loop_points(&store, *l), pts);
        }
        prop_assert_eq!(store.live_count(EntityKind::Loop), 1 + initial.len());
    }
}
