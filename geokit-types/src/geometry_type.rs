//! See documentation for [`GeometryType`].
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeoKitTypesError;

/// Tag identifying the kind of a [`Geometry`](crate::Geometry).
///
/// The string representation of the tag is the OGC name of the type (`LineString`, `MultiPolygon` etc.), which is
/// also the name used by GeoJSON and, in upper case, by Well-Known-Text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryType {
    /// Single point.
    Point,
    /// Sequence of connected vertices.
    LineString,
    /// Area with optional holes.
    Polygon,
    /// Set of points.
    MultiPoint,
    /// Set of line strings.
    MultiLineString,
    /// Set of polygons.
    MultiPolygon,
    /// Heterogeneous set of geometries.
    GeometryCollection,
    /// Axis aligned geographic rectangle.
    BoundingBox,
}

impl GeometryType {
    /// OGC name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
            GeometryType::BoundingBox => "BoundingBox",
        }
    }
}

impl Display for GeometryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryType {
    type Err = GeoKitTypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s.trim().to_ascii_lowercase().as_str() {
            "point" => GeometryType::Point,
            "linestring" => GeometryType::LineString,
            "polygon" => GeometryType::Polygon,
            "multipoint" => GeometryType::MultiPoint,
            "multilinestring" => GeometryType::MultiLineString,
            "multipolygon" => GeometryType::MultiPolygon,
            "geometrycollection" => GeometryType::GeometryCollection,
            "boundingbox" => GeometryType::BoundingBox,
            _ => {
                return Err(GeoKitTypesError::Conversion(format!(
                    "unknown geometry type {s}"
                )))
            }
        };

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_case_insensitive() {
        assert_eq!(
            "MULTIPOLYGON".parse::<GeometryType>().unwrap(),
            GeometryType::MultiPolygon
        );
        assert_eq!(
            "LineString".parse::<GeometryType>().unwrap(),
            GeometryType::LineString
        );
        assert!("Circle".parse::<GeometryType>().is_err());
        assert_eq!(GeometryType::GeometryCollection.to_string(), "GeometryCollection");
    }
}
