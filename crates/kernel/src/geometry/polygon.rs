//! Planar polygon helpers used to present loops as 2D outlines.

use super::point::{Point2d, Point3d};
use super::vector::Vec3;

/// Unit normal of a (possibly non-planar) polygon by Newell's method.
/// Counter-clockwise vertices about the result. `None` for degenerate input.
pub fn newell_normal(points: &[Point3d]) -> Option<Vec3> {
    if points.len() < 3 {
        return None;
    }
    let mut n = Vec3::ZERO;
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n.normalized()
}

/// Project points into the plane through the origin with the given normal.
/// The frame is right-handed about `normal`, so a polygon that is
/// counter-clockwise about `normal` stays counter-clockwise in 2D.
pub fn project_to_plane(points: &[Point3d], normal: &Vec3) -> Vec<Point2d> {
    let (u, v) = match normal.any_perpendicular() {
        Some(u) => (u, normal.cross(&u)),
        None => (Vec3::X, Vec3::Y),
    };
    points
        .iter()
        .map(|p| {
            let w = p.to_vec3();
            Point2d::new(w.dot(&u), w.dot(&v))
        })
        .collect()
}

/// Shoelace signed area; positive for counter-clockwise polygons.
pub fn signed_area(points: &[Point2d]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice += a.x * b.y - b.x * a.y;
    }
    twice * 0.5
}

pub fn is_clockwise(points: &[Point2d]) -> bool {
    signed_area(points) < 0.0
}
