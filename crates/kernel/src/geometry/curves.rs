//! Edge curves and the oriented `MathCurve` view handed out by co-edges.
//!
//! Every curve is parameterized on `[0, 1]` from its start point to its end
//! point, so reversing a curve is `t -> 1 - t` and never needs a copy.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::point::Point3d;
use super::vector::Vec3;

/// Geometry carried by an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Line(LineSegment),
    Arc(Arc3d),
}

/// A straight segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point3d,
    pub end: Point3d,
}

impl LineSegment {
    pub fn new(start: Point3d, end: Point3d) -> Self {
        Self { start, end }
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        self.start.lerp(&self.end, t)
    }

    pub fn derivative(&self) -> Vec3 {
        self.end - self.start
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }
}

/// A circular arc sweeping counter-clockwise about `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc3d {
    pub center: Point3d,
    pub normal: Vec3,
    /// Unit direction from the center to the start point.
    pub x_axis: Vec3,
    pub radius: f64,
    /// Swept angle in radians, in `(0, 2π)`.
    pub sweep: f64,
}

impl Arc3d {
    /// The arc from `start` to `end` sweeping `sweep` radians about `normal`.
    /// A negative sweep runs clockwise. Returns `None` for a degenerate chord
    /// or a sweep outside `(0, 2π)` in magnitude.
    pub fn through(start: Point3d, end: Point3d, normal: Vec3, sweep: f64) -> Option<Self> {
        let (normal, sweep) = if sweep < 0.0 {
            (-normal, -sweep)
        } else {
            (normal, sweep)
        };
        if sweep < 1e-12 || sweep >= TAU {
            return None;
        }
        let normal = normal.normalized()?;
        let chord = end - start;
        let chord_len = chord.length();
        if chord_len < 1e-12 {
            return None;
        }

        let half = sweep * 0.5;
        let radius = chord_len / (2.0 * half.sin());
        let left = normal.cross(&(chord / chord_len)).normalized()?;
        let center = start.midpoint(&end) + left * (radius * half.cos());
        let x_axis = (start - center).normalized()?;

        Some(Self {
            center,
            normal,
            x_axis,
            radius,
            sweep,
        })
    }

    fn y_axis(&self) -> Vec3 {
        self.normal.cross(&self.x_axis)
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        let angle = self.sweep * t;
        self.center
            + self.x_axis * (self.radius * angle.cos())
            + self.y_axis() * (self.radius * angle.sin())
    }

    pub fn derivative(&self, t: f64) -> Vec3 {
        let angle = self.sweep * t;
        (self.x_axis * (-self.radius * angle.sin()) + self.y_axis() * (self.radius * angle.cos()))
            * self.sweep
    }

    pub fn length(&self) -> f64 {
        self.radius * self.sweep
    }
}

impl Curve {
    pub fn line(start: Point3d, end: Point3d) -> Self {
        Curve::Line(LineSegment::new(start, end))
    }

    /// Evaluate the curve at `t` in `[0, 1]`.
    pub fn evaluate(&self, t: f64) -> Point3d {
        match self {
            Curve::Line(l) => l.evaluate(t),
            Curve::Arc(a) => a.evaluate(t),
        }
    }

    pub fn derivative(&self, t: f64) -> Vec3 {
        match self {
            Curve::Line(l) => l.derivative(),
            Curve::Arc(a) => a.derivative(t),
        }
    }

    pub fn start_point(&self) -> Point3d {
        self.evaluate(0.0)
    }

    pub fn end_point(&self) -> Point3d {
        self.evaluate(1.0)
    }

    pub fn length(&self) -> f64 {
        match self {
            Curve::Line(l) => l.length(),
            Curve::Arc(a) => a.length(),
        }
    }

    /// Same kind of curve running between new endpoints. An arc that can no
    /// longer be fitted degrades to a line.
    pub fn refit(&self, start: Point3d, end: Point3d) -> Curve {
        match self {
            Curve::Line(_) => Curve::line(start, end),
            Curve::Arc(a) => Arc3d::through(start, end, a.normal, a.sweep)
                .map(Curve::Arc)
                .unwrap_or_else(|| Curve::line(start, end)),
        }
    }

    /// Forward-oriented view of this curve.
    pub fn to_math_curve(&self) -> MathCurve<'_> {
        MathCurve {
            curve: self,
            reversed: false,
        }
    }

    pub fn curve_type_name(&self) -> &'static str {
        match self {
            Curve::Line(_) => "Line",
            Curve::Arc(_) => "Arc",
        }
    }
}

/// An oriented, borrowed view of a [`Curve`].
///
/// Reversal flips a flag; the underlying curve is shared with the
/// forward-oriented view and is never copied or mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MathCurve<'a> {
    curve: &'a Curve,
    reversed: bool,
}

impl<'a> MathCurve<'a> {
    pub fn curve(&self) -> &'a Curve {
        self.curve
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// The same curve traversed the other way.
    pub fn reversed(self) -> Self {
        Self {
            curve: self.curve,
            reversed: !self.reversed,
        }
    }

    fn map_param(&self, t: f64) -> f64 {
        if self.reversed {
            1.0 - t
        } else {
            t
        }
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        self.curve.evaluate(self.map_param(t))
    }

    pub fn derivative(&self, t: f64) -> Vec3 {
        let d = self.curve.derivative(self.map_param(t));
        if self.reversed {
            -d
        } else {
            d
        }
    }

    pub fn start_point(&self) -> Point3d {
        self.evaluate(0.0)
    }

    pub fn end_point(&self) -> Point3d {
        self.evaluate(1.0)
    }

    /// `segments + 1` evenly spaced points in traversal order.
    pub fn sample(&self, segments: usize) -> Vec<Point3d> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.evaluate(i as f64 / segments as f64))
            .collect()
    }

    /// Materialize an owned curve running in this view's direction.
    pub fn to_curve(&self) -> Curve {
        if !self.reversed {
            return self.curve.clone();
        }
        match self.curve {
            Curve::Line(l) => Curve::line(l.end, l.start),
            Curve::Arc(a) => Arc3d::through(a.evaluate(1.0), a.evaluate(0.0), a.normal, -a.sweep)
                .map(Curve::Arc)
                .unwrap_or_else(|| Curve::line(a.evaluate(1.0), a.evaluate(0.0))),
        }
    }
}
