use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::coordinate_collection::CoordinateCollection;
use crate::geometry::Shape;
use crate::geometry_type::GeometryType;
use crate::metadata::ShapeMetadata;
use crate::style::StyleId;

/// Ordered sequence of connected vertices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineString {
    /// Vertices of the line.
    pub vertices: CoordinateCollection,
    /// Metadata of the line.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the line.
    pub style_key: Option<StyleId>,
}

impl LineString {
    /// Creates a new line string.
    pub fn new(vertices: impl Into<CoordinateCollection>) -> Self {
        Self {
            vertices: vertices.into(),
            metadata: None,
            style_key: None,
        }
    }

    /// A line string is valid if it has at least 2 vertices.
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 2
    }
}

impl_attributed!(LineString);

impl Shape for LineString {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::LineString
    }

    fn num_geometries(&self) -> usize {
        1
    }

    fn envelope(&self) -> Option<BoundingBox> {
        self.vertices.envelope()
    }

    fn is_3d(&self) -> bool {
        self.vertices.is_3d()
    }

    fn num_points(&self) -> usize {
        self.vertices.len()
    }

    fn reduce(&mut self, tolerance: f64) {
        self.vertices.reduce(tolerance);
    }
}
