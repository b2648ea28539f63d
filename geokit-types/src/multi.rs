use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::geometry::Shape;
use crate::geometry_type::GeometryType;
use crate::line_string::LineString;
use crate::metadata::ShapeMetadata;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::style::StyleId;

/// Set of points sharing the same metadata and style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPoint {
    /// Points of the geometry.
    pub points: Vec<Point>,
    /// Metadata of the geometry.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the geometry.
    pub style_key: Option<StyleId>,
}

impl MultiPoint {
    /// Creates a new multipoint.
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            metadata: None,
            style_key: None,
        }
    }
}

impl_attributed!(MultiPoint);

impl Shape for MultiPoint {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::MultiPoint
    }

    fn num_geometries(&self) -> usize {
        self.points.len()
    }

    fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::from_coordinates(self.points.iter().map(|p| &p.coordinate))
    }

    fn is_3d(&self) -> bool {
        self.points.first().map(|p| p.is_3d()).unwrap_or(false)
    }

    fn num_points(&self) -> usize {
        self.points.len()
    }

    fn reduce(&mut self, _tolerance: f64) {}
}

/// Set of line strings sharing the same metadata and style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiLineString {
    /// Lines of the geometry.
    pub line_strings: Vec<LineString>,
    /// Metadata of the geometry.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the geometry.
    pub style_key: Option<StyleId>,
}

impl MultiLineString {
    /// Creates a new multi line string.
    pub fn new(line_strings: Vec<LineString>) -> Self {
        Self {
            line_strings,
            metadata: None,
            style_key: None,
        }
    }
}

impl_attributed!(MultiLineString);

impl Shape for MultiLineString {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::MultiLineString
    }

    fn num_geometries(&self) -> usize {
        self.line_strings.len()
    }

    fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::join_all(self.line_strings.iter().filter_map(|l| l.envelope()))
    }

    fn is_3d(&self) -> bool {
        self.line_strings
            .first()
            .map(|l| l.is_3d())
            .unwrap_or(false)
    }

    fn num_points(&self) -> usize {
        self.line_strings.iter().map(|l| l.num_points()).sum()
    }

    fn reduce(&mut self, tolerance: f64) {
        for line in &mut self.line_strings {
            line.reduce(tolerance);
        }
    }
}

/// Set of polygons sharing the same metadata and style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    /// Polygons of the geometry.
    pub polygons: Vec<Polygon>,
    /// Metadata of the geometry.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the geometry.
    pub style_key: Option<StyleId>,
}

impl MultiPolygon {
    /// Creates a new multipolygon.
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self {
            polygons,
            metadata: None,
            style_key: None,
        }
    }

    /// Repairs all the polygons. See [`Polygon::make_valid`].
    pub fn make_valid(&mut self) {
        for polygon in &mut self.polygons {
            polygon.make_valid();
        }
    }
}

impl_attributed!(MultiPolygon);

impl Shape for MultiPolygon {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::MultiPolygon
    }

    fn num_geometries(&self) -> usize {
        self.polygons.len()
    }

    fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::join_all(self.polygons.iter().filter_map(|p| p.envelope()))
    }

    fn is_3d(&self) -> bool {
        self.polygons.first().map(|p| p.is_3d()).unwrap_or(false)
    }

    fn num_points(&self) -> usize {
        self.polygons.iter().map(|p| p.num_points()).sum()
    }

    fn reduce(&mut self, tolerance: f64) {
        for polygon in &mut self.polygons {
            polygon.reduce(tolerance);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::latlon;

    #[test]
    fn multi_point_envelope() {
        let multi = MultiPoint::new(vec![
            Point::new(latlon!(10.0, 10.0)),
            Point::new(latlon!(20.0, 30.0)),
        ]);
        let envelope = multi.envelope().unwrap();
        assert_abs_diff_eq!(envelope.north(), 20.0);
        assert_abs_diff_eq!(envelope.south(), 10.0);
        assert_abs_diff_eq!(envelope.west(), 10.0);
        assert_abs_diff_eq!(envelope.east(), 30.0);
        assert_eq!(multi.num_geometries(), 2);
        assert!(!multi.is_3d());
    }

    #[test]
    fn multi_line_counts() {
        let multi = MultiLineString::new(vec![
            LineString::new(vec![latlon!(0.0, 0.0, 1.0), latlon!(1.0, 1.0, 1.0)]),
            LineString::new(vec![
                latlon!(2.0, 2.0, 1.0),
                latlon!(3.0, 3.0, 1.0),
                latlon!(4.0, 2.0, 1.0),
            ]),
        ]);
        assert_eq!(multi.num_points(), 5);
        assert!(multi.is_3d());
        assert_eq!(multi.geometry_type(), GeometryType::MultiLineString);
    }

    #[test]
    fn empty_multi_has_no_envelope() {
        assert!(MultiPolygon::default().envelope().is_none());
    }
}
