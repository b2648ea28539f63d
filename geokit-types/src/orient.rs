//! Orientation of point triplets and of closed rings.

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// Orientation of a triplet of points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Clockwise
    Clockwise,
    /// Counterclockwise
    Counterclockwise,
    /// Collinear
    Collinear,
}

impl Orientation {
    /// Determines orientation of a triplet of points, with longitude used as `x` and latitude as `y`.
    pub fn triplet(p: &Coordinate, q: &Coordinate, r: &Coordinate) -> Self {
        let value = (q.latitude() - p.latitude()) * (r.longitude() - q.longitude())
            - (q.longitude() - p.longitude()) * (r.latitude() - q.latitude());

        if value > 0.0 {
            Self::Clockwise
        } else if value < 0.0 {
            Self::Counterclockwise
        } else {
            Self::Collinear
        }
    }
}

/// Direction in which a closed ring is traversed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Winding {
    /// Clockwise
    Clockwise,
    /// Counterclockwise
    CounterClockwise,
}

/// Determines winding of a closed ring (first coordinate repeated at the end).
///
/// Returns `None` for rings with less than 4 coordinates and for rings that do not have at least three distinct
/// vertices around the top-most one.
///
/// The test is made at the vertex with the largest latitude (the first one if several vertices share it): the turn
/// made at that vertex between its distinct neighbours gives the winding of the whole ring. When the neighbours are
/// collinear with the vertex, the ring is counterclockwise if the previous neighbour lies to the east of the next one.
pub fn ring_winding(ring: &[Coordinate]) -> Option<Winding> {
    if ring.len() < 4 {
        return None;
    }

    // The closing coordinate duplicates the first one.
    let count = ring.len() - 1;

    let mut top = 0;
    for (index, coord) in ring.iter().enumerate().take(count).skip(1) {
        if coord.latitude() > ring[top].latitude() {
            top = index;
        }
    }

    let same = |a: &Coordinate, b: &Coordinate| {
        a.latitude() == b.latitude() && a.longitude() == b.longitude()
    };

    let mut prev = top;
    loop {
        prev = (prev + count - 1) % count;
        if prev == top || !same(&ring[prev], &ring[top]) {
            break;
        }
    }

    let mut next = top;
    loop {
        next = (next + 1) % count;
        if next == top || !same(&ring[next], &ring[top]) {
            break;
        }
    }

    let (p, q, r) = (&ring[prev], &ring[top], &ring[next]);
    if same(p, q) || same(r, q) || same(p, r) {
        return None;
    }

    Some(match Orientation::triplet(p, q, r) {
        Orientation::Counterclockwise => Winding::CounterClockwise,
        Orientation::Clockwise => Winding::Clockwise,
        Orientation::Collinear if p.longitude() > r.longitude() => Winding::CounterClockwise,
        Orientation::Collinear => Winding::Clockwise,
    })
}

/// Returns true if the closed ring is traversed counterclockwise. Rings with less than 4 coordinates are never
/// counterclockwise.
pub fn is_ccw(ring: &[Coordinate]) -> bool {
    ring_winding(ring) == Some(Winding::CounterClockwise)
}
