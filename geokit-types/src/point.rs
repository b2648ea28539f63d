use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::coordinate::Coordinate;
use crate::geometry::Shape;
use crate::geometry_type::GeometryType;
use crate::metadata::ShapeMetadata;
use crate::style::StyleId;

/// Single location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Location of the point.
    pub coordinate: Coordinate,
    /// Metadata of the point.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the point.
    pub style_key: Option<StyleId>,
}

impl Point {
    /// Creates a new point.
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            metadata: None,
            style_key: None,
        }
    }
}

impl_attributed!(Point);

impl From<Coordinate> for Point {
    fn from(value: Coordinate) -> Self {
        Self::new(value)
    }
}

impl Shape for Point {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::Point
    }

    fn num_geometries(&self) -> usize {
        1
    }

    fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::from_coordinates(std::iter::once(&self.coordinate))
    }

    fn is_3d(&self) -> bool {
        self.coordinate.has_altitude()
    }

    fn num_points(&self) -> usize {
        1
    }

    fn reduce(&mut self, _tolerance: f64) {}
}
