//! Tolerance-aware 2D geometry helpers.
//!
//! Pure functions over [`Point`]s. Distances are Euclidean in map units.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Equality within `tolerance` on both axes.
    pub fn approx_eq(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Grid step for a rounding precision of `precision` decimal places.
pub fn grid_step(precision: u32) -> f64 {
    10f64.powi(-(precision as i32))
}

/// Round a coordinate to `precision` decimal places, expressed as integer grid cells.
pub fn grid_cell(point: &Point, precision: u32) -> (i64, i64) {
    let scale = 10f64.powi(precision as i32);
    ((point.x * scale).round() as i64, (point.y * scale).round() as i64)
}

/// Distance from `point` to the segment `a`-`b`.
pub fn distance_to_segment(point: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return point.distance(a);
    }
    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    point.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}

/// Whether `point` lies on segment `a`-`b` within `tolerance`.
pub fn point_on_segment(point: &Point, a: &Point, b: &Point, tolerance: f64) -> bool {
    distance_to_segment(point, a, b) <= tolerance
}

/// Distance from `point` to a polyline; a single-point polyline degenerates to a point.
pub fn distance_to_polyline(point: &Point, line: &[Point]) -> Option<f64> {
    match line {
        [] => None,
        [only] => Some(point.distance(only)),
        _ => line
            .windows(2)
            .map(|w| distance_to_segment(point, &w[0], &w[1]))
            .min_by(f64::total_cmp),
    }
}

/// Whether `point` lies on any segment of `line` within `tolerance`.
pub fn point_on_polyline(point: &Point, line: &[Point], tolerance: f64) -> bool {
    distance_to_polyline(point, line).is_some_and(|d| d <= tolerance)
}

/// Smallest distance from `point` to any of `candidates`.
pub fn nearest_distance<'a>(
    point: &Point,
    candidates: impl IntoIterator<Item = &'a Point>,
) -> Option<f64> {
    candidates
        .into_iter()
        .map(|c| point.distance(c))
        .min_by(f64::total_cmp)
}
