//! Coordinate and named-terminal lookup of graph vertices.
//!
//! Coordinates are rounded to the configured precision and stored as integer grid
//! cells. A lookup first tries the exact cell; on a miss it walks square rings of
//! cells around it, out to `buffer_radius`, and returns the first hit. Each ring is
//! probed clockwise starting at its top-left corner (top edge left to right, right
//! edge top to bottom, bottom edge right to left, left edge bottom to top), so
//! ties between several candidates always resolve the same way.
//!
//! Every key carries a slot number, so a two-state device can own two vertices at
//! the same coordinate.

use std::collections::HashMap;

use gnt_core::geometry::grid_cell;
use gnt_core::{Point, TopologyConfig};
use serde::Serialize;

/// Builder-internal vertex handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct VertexId(usize);

impl VertexId {
    #[inline]
    pub fn new(value: usize) -> Self {
        VertexId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct VertexIndex {
    precision: u32,
    buffer_radius: u32,
    by_cell: HashMap<(i64, i64, u8), VertexId>,
    by_name: HashMap<String, VertexId>,
}

impl VertexIndex {
    pub fn new(precision: u32, buffer_radius: u32) -> Self {
        Self {
            precision,
            buffer_radius,
            by_cell: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn from_config(config: &TopologyConfig) -> Self {
        Self::new(config.precision, config.buffer_radius)
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Register a coordinate. The first vertex registered for a cell keeps it.
    pub fn register(&mut self, vertex: VertexId, point: &Point, slot: u8) {
        let (x, y) = grid_cell(point, self.precision);
        self.by_cell.entry((x, y, slot)).or_insert(vertex);
    }

    /// Register an external terminal identifier.
    pub fn register_named(&mut self, vertex: VertexId, name: &str, slot: u8) {
        self.by_name
            .entry(named_key(name, slot))
            .or_insert(vertex);
    }

    /// Resolve a coordinate: exact cell first, then the ring scan.
    pub fn resolve(&self, point: &Point, slot: u8) -> Option<VertexId> {
        let (x, y) = grid_cell(point, self.precision);
        if let Some(v) = self.by_cell.get(&(x, y, slot)) {
            return Some(*v);
        }
        (1..=self.buffer_radius as i64).find_map(|k| {
            ring_offsets(k).find_map(|(dx, dy)| self.by_cell.get(&(x + dx, y + dy, slot)).copied())
        })
    }

    /// Resolve an external terminal identifier; no tolerance applies.
    pub fn resolve_named(&self, name: &str, slot: u8) -> Option<VertexId> {
        self.by_name.get(&named_key(name, slot)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_cell.len() + self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn named_key(name: &str, slot: u8) -> String {
    format!("{name}:{slot}")
}

/// Cell offsets of the square ring at distance `k`, clockwise from the top-left corner.
fn ring_offsets(k: i64) -> impl Iterator<Item = (i64, i64)> {
    let top = (-k..k).map(move |dx| (dx, k));
    let right = (-k + 1..=k).rev().map(move |dy| (k, dy));
    let bottom = (-k + 1..=k).rev().map(move |dx| (dx, -k));
    let left = (-k..k).map(move |dy| (-k, dy));
    top.chain(right).chain(bottom).chain(left)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ring_covers_boundary_once() {
        for k in 1..4 {
            let cells: Vec<_> = ring_offsets(k).collect();
            assert_eq!(cells.len() as i64, 8 * k);
            let unique: HashSet<_> = cells.iter().collect();
            assert_eq!(unique.len(), cells.len());
            assert!(cells.iter().all(|(x, y)| x.abs().max(y.abs()) == k));
            assert_eq!(cells[0], (-k, k));
        }
    }

    #[test]
    fn test_exact_and_tolerant_lookup() {
        let mut index = VertexIndex::new(3, 2);
        index.register(VertexId::new(7), &Point::new(100.0, 200.0), 1);

        assert_eq!(index.resolve(&Point::new(100.0004, 200.0), 1), Some(VertexId::new(7)));
        assert_eq!(index.resolve(&Point::new(100.002, 199.999), 1), Some(VertexId::new(7)));
        assert_eq!(index.resolve(&Point::new(100.003, 200.0), 1), None);
        assert_eq!(index.resolve(&Point::new(100.0, 200.0), 2), None);
    }

    #[test]
    fn test_zero_radius_is_exact_only() {
        let mut index = VertexIndex::new(2, 0);
        index.register(VertexId::new(1), &Point::new(1.0, 1.0), 1);
        assert_eq!(index.resolve(&Point::new(1.004, 1.0), 1), Some(VertexId::new(1)));
        assert_eq!(index.resolve(&Point::new(1.01, 1.0), 1), None);
    }

    #[test]
    fn test_scan_order_breaks_ties() {
        let mut index = VertexIndex::new(0, 1);
        // Both sit on ring 1 around the origin; the top edge is scanned before the right edge.
        index.register(VertexId::new(1), &Point::new(1.0, 0.0), 1);
        index.register(VertexId::new(2), &Point::new(0.0, 1.0), 1);
        assert_eq!(index.resolve(&Point::new(0.0, 0.0), 1), Some(VertexId::new(2)));
    }

    #[test]
    fn test_first_registration_wins_and_slots_are_separate() {
        let mut index = VertexIndex::new(3, 0);
        let p = Point::new(5.0, 5.0);
        index.register(VertexId::new(1), &p, 1);
        index.register(VertexId::new(2), &p, 1);
        index.register(VertexId::new(3), &p, 2);
        assert_eq!(index.resolve(&p, 1), Some(VertexId::new(1)));
        assert_eq!(index.resolve(&p, 2), Some(VertexId::new(3)));
    }

    #[test]
    fn test_named_lookup() {
        let mut index = VertexIndex::new(3, 2);
        index.register_named(VertexId::new(4), "CN-17", 1);
        assert_eq!(index.resolve_named("CN-17", 1), Some(VertexId::new(4)));
        assert_eq!(index.resolve_named("CN-17", 2), None);
        assert_eq!(index.resolve_named("CN-1", 1), None);
    }
}
