use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::coordinate::Coordinate;
use crate::coordinate_collection::CoordinateCollection;
use crate::geometry::Shape;
use crate::geometry_type::GeometryType;
use crate::metadata::ShapeMetadata;
use crate::orient::Winding;
use crate::style::StyleId;

/// Polygon geometry. Polygon consists of one exterior ring, and zero or more interior rings (holes).
///
/// A valid polygon has its exterior ring traversed counterclockwise and all its interior rings clockwise, with every
/// ring closed (the first coordinate repeated at the end). Readers produce polygons as they appear in the source,
/// use [`Polygon::make_valid`] to enforce these rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Outer boundary.
    pub exterior_ring: CoordinateCollection,
    /// Holes.
    pub interior_rings: Vec<CoordinateCollection>,
    /// Metadata of the polygon.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the polygon.
    pub style_key: Option<StyleId>,
}

impl Polygon {
    /// Creates a new polygon without holes.
    pub fn new(exterior_ring: impl Into<CoordinateCollection>) -> Self {
        Self::with_holes(exterior_ring, vec![])
    }

    /// Creates a new polygon with holes.
    pub fn with_holes(
        exterior_ring: impl Into<CoordinateCollection>,
        interior_rings: Vec<CoordinateCollection>,
    ) -> Self {
        Self {
            exterior_ring: exterior_ring.into(),
            interior_rings,
            metadata: None,
            style_key: None,
        }
    }

    /// Iterates over all rings of the polygon starting with the exterior one.
    pub fn rings(&self) -> impl Iterator<Item = &CoordinateCollection> {
        std::iter::once(&self.exterior_ring).chain(self.interior_rings.iter())
    }

    /// Returns true if the exterior ring is counterclockwise and all interior rings are clockwise.
    pub fn is_valid(&self) -> bool {
        self.exterior_ring.is_ccw()
            && self
                .interior_rings
                .iter()
                .all(|ring| ring.winding() == Some(Winding::Clockwise))
    }

    /// Repairs the polygon: closes all rings, pads rings with less than 3 coordinates by repeating their last
    /// coordinate and then reverses rings with wrong orientation.
    ///
    /// Rings without a determinable orientation (too short, or with all the vertices around the top-most one
    /// coinciding) are left in their order. Applying the operation twice gives the same result as applying it once.
    pub fn make_valid(&mut self) {
        repair_ring(&mut self.exterior_ring, Winding::CounterClockwise);
        for ring in &mut self.interior_rings {
            repair_ring(ring, Winding::Clockwise);
        }
    }

    /// Returns true if the coordinate is inside the exterior ring and not inside any of the holes.
    ///
    /// Uses the even-odd ray casting rule in the planar longitude/latitude space.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        ring_contains(&self.exterior_ring, coordinate)
            && !self
                .interior_rings
                .iter()
                .any(|ring| ring_contains(ring, coordinate))
    }
}

impl_attributed!(Polygon);

impl From<CoordinateCollection> for Polygon {
    fn from(value: CoordinateCollection) -> Self {
        Self::new(value)
    }
}

impl Shape for Polygon {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::Polygon
    }

    fn num_geometries(&self) -> usize {
        1
    }

    fn envelope(&self) -> Option<BoundingBox> {
        self.exterior_ring.envelope()
    }

    fn is_3d(&self) -> bool {
        self.exterior_ring.is_3d()
    }

    fn num_points(&self) -> usize {
        self.rings().map(|ring| ring.len()).sum()
    }

    /// Reduces every ring. A ring that would be left with less than 4 coordinates is kept as is.
    fn reduce(&mut self, tolerance: f64) {
        reduce_ring(&mut self.exterior_ring, tolerance);
        for ring in &mut self.interior_rings {
            reduce_ring(ring, tolerance);
        }
    }
}

fn reduce_ring(ring: &mut CoordinateCollection, tolerance: f64) {
    let mut reduced = ring.clone();
    reduced.reduce(tolerance);
    if reduced.len() >= 4 {
        *ring = reduced;
    }
}

fn repair_ring(ring: &mut CoordinateCollection, expected: Winding) {
    ring.close();
    while !ring.is_empty() && ring.len() < 3 {
        let last = ring[ring.len() - 1];
        ring.push(last);
    }

    match ring.winding() {
        Some(winding) if winding != expected => ring.reverse(),
        _ => {}
    }
}

/// Even-odd ray casting test of a coordinate against a ring. The ring may or may not repeat its first coordinate.
pub fn ring_contains(ring: &[Coordinate], coordinate: &Coordinate) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let x = coordinate.longitude();
    let y = coordinate.latitude();
    let mut inside = false;

    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].longitude(), ring[i].latitude());
        let (xj, yj) = (ring[j].longitude(), ring[j].latitude());

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }

        j = i;
    }

    inside
}
