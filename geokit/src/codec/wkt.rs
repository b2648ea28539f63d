//! Well-Known-Text reader and writer.
//!
//! Coordinates are written in `lon lat [alt]` order with at most five decimal places. The reader accepts the
//! `Z`, `M` and `ZM` dimension markers (measures are read and dropped), `EMPTY` geometries and an optional
//! `SRID=...;` prefix.

use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;

use geokit_types::{
    Coordinate, CoordinateCollection, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon, Shape, SpatialDataSet,
};
use wkt::types::Coord;
use wkt::Wkt;

use crate::codec::{ReadOptions, SpatialReader, SpatialWriter, TextWriter, UriReader};
use crate::error::GeoKitError;

/// Reader of a single WKT geometry.
#[derive(Debug, Clone, Default)]
pub struct WktReader {
    options: ReadOptions,
}

impl WktReader {
    /// Creates a new reader.
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }
}

impl SpatialReader for WktReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let text = std::str::from_utf8(data).map_err(|err| GeoKitError::parse(err.to_string()))?;
        let geometry = parse_geometry(text)?;
        let mut dataset = SpatialDataSet::from_geometries(vec![geometry]);
        self.options.finish(&mut dataset);
        Ok(dataset)
    }
}

impl UriReader for WktReader {}

/// Writer of WKT. A dataset with one geometry is written as that geometry, any other dataset as a
/// `GEOMETRYCOLLECTION`.
#[derive(Debug, Clone, Default)]
pub struct WktWriter;

impl SpatialWriter for WktWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        let text = match data.geometries.as_slice() {
            [single] => to_wkt(single),
            geometries => {
                let mut text = String::from("GEOMETRYCOLLECTION");
                write_members(&mut text, geometries.iter(), |out, g| write_geometry(out, g));
                text
            }
        };

        out.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl TextWriter for WktWriter {}

/// Parses a WKT geometry.
pub fn parse_geometry(text: &str) -> Result<Geometry, GeoKitError> {
    let text = text.trim();
    let text = match text.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("SRID=") => match text.find(';') {
            Some(index) => &text[index + 1..],
            None => return Err(GeoKitError::parse("SRID prefix is not terminated with ';'")),
        },
        _ => text,
    };

    let parsed = Wkt::<f64>::from_str(&text.to_ascii_uppercase())
        .map_err(|err| GeoKitError::parse(format!("invalid WKT: {err}")))?;
    convert(parsed)
}

/// Converts the geometry into WKT.
pub fn to_wkt(geometry: &Geometry) -> String {
    let mut out = String::new();
    write_geometry(&mut out, geometry);
    out
}

/// Formats a number with at most five decimal places, without trailing zeros.
pub(crate) fn format_number(value: f64) -> String {
    let formatted = format!("{value:.5}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        v => v.to_string(),
    }
}

fn convert(wkt: Wkt<f64>) -> Result<Geometry, GeoKitError> {
    let geometry = match wkt {
        Wkt::Point(point) => Point::new(point_coordinate(point)?).into(),
        Wkt::LineString(line) => LineString::new(coordinates(line)).into(),
        Wkt::Polygon(polygon) => convert_polygon(polygon).into(),
        Wkt::MultiPoint(multi) => {
            let points = multi
                .0
                .into_iter()
                .map(|point| Ok(Point::new(point_coordinate(point)?)))
                .collect::<Result<Vec<_>, GeoKitError>>()?;
            MultiPoint::new(points).into()
        }
        Wkt::MultiLineString(multi) => {
            MultiLineString::new(multi.0.into_iter().map(|line| LineString::new(coordinates(line))).collect()).into()
        }
        Wkt::MultiPolygon(multi) => MultiPolygon::new(multi.0.into_iter().map(convert_polygon).collect()).into(),
        Wkt::GeometryCollection(collection) => {
            let geometries = collection
                .0
                .into_iter()
                .map(convert)
                .collect::<Result<Vec<_>, GeoKitError>>()?;
            GeometryCollection::new(geometries).into()
        }
    };

    Ok(geometry)
}

fn convert_polygon(polygon: wkt::types::Polygon<f64>) -> Polygon {
    let mut rings = polygon.0.into_iter().map(coordinates);
    let exterior = rings.next().unwrap_or_default();
    Polygon::with_holes(exterior, rings.collect())
}

fn point_coordinate(point: wkt::types::Point<f64>) -> Result<Coordinate, GeoKitError> {
    point
        .0
        .map(coordinate)
        .ok_or_else(|| GeoKitError::parse("empty point cannot be represented"))
}

fn coordinates(line: wkt::types::LineString<f64>) -> CoordinateCollection {
    line.0.into_iter().map(coordinate).collect::<Vec<_>>().into()
}

/// WKT coordinates are `x y [z] [m]` in longitude, latitude order. Measures are dropped.
fn coordinate(coord: Coord<f64>) -> Coordinate {
    Coordinate::from_parts(coord.y, coord.x, coord.z)
}

fn write_geometry(out: &mut String, geometry: &Geometry) {
    let is_3d = geometry.is_3d();
    let tag = |name: &str| {
        if is_3d {
            format!("{name} Z")
        } else {
            name.to_string()
        }
    };

    match geometry {
        Geometry::Point(point) => {
            out.push_str(&tag("POINT"));
            out.push_str(" (");
            write_coordinate(out, &point.coordinate, is_3d);
            out.push(')');
        }
        Geometry::LineString(line) => {
            out.push_str(&tag("LINESTRING"));
            write_coordinates(out, &line.vertices, is_3d);
        }
        Geometry::Polygon(polygon) => {
            out.push_str(&tag("POLYGON"));
            write_polygon(out, polygon, is_3d);
        }
        Geometry::MultiPoint(multi) => {
            out.push_str(&tag("MULTIPOINT"));
            write_members(out, multi.points.iter(), |out, point| {
                out.push('(');
                write_coordinate(out, &point.coordinate, is_3d);
                out.push(')');
            });
        }
        Geometry::MultiLineString(multi) => {
            out.push_str(&tag("MULTILINESTRING"));
            write_members(out, multi.line_strings.iter(), |out, line| {
                write_coordinates_body(out, &line.vertices, is_3d)
            });
        }
        Geometry::MultiPolygon(multi) => {
            out.push_str(&tag("MULTIPOLYGON"));
            write_members(out, multi.polygons.iter(), |out, polygon| {
                write_polygon_body(out, polygon, is_3d)
            });
        }
        Geometry::GeometryCollection(collection) => {
            out.push_str("GEOMETRYCOLLECTION");
            write_members(out, collection.geometries.iter(), write_geometry);
        }
        Geometry::BoundingBox(bounds) => {
            out.push_str("POLYGON");
            write_polygon(out, &bounds.bounds.to_polygon(), false);
        }
    }
}

fn write_members<'a, T: 'a>(
    out: &mut String,
    members: impl ExactSizeIterator<Item = &'a T>,
    mut write_member: impl FnMut(&mut String, &'a T),
) {
    if members.len() == 0 {
        out.push_str(" EMPTY");
        return;
    }

    out.push_str(" (");
    for (index, member) in members.enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_member(out, member);
    }
    out.push(')');
}

fn write_polygon(out: &mut String, polygon: &Polygon, is_3d: bool) {
    if polygon.exterior_ring.is_empty() {
        out.push_str(" EMPTY");
    } else {
        out.push(' ');
        write_polygon_body(out, polygon, is_3d);
    }
}

fn write_polygon_body(out: &mut String, polygon: &Polygon, is_3d: bool) {
    out.push('(');
    for (index, ring) in polygon.rings().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_coordinates_body(out, ring, is_3d);
    }
    out.push(')');
}

fn write_coordinates(out: &mut String, coordinates: &[Coordinate], is_3d: bool) {
    if coordinates.is_empty() {
        out.push_str(" EMPTY");
    } else {
        out.push(' ');
        write_coordinates_body(out, coordinates, is_3d);
    }
}

fn write_coordinates_body(out: &mut String, coordinates: &[Coordinate], is_3d: bool) {
    out.push('(');
    for (index, coordinate) in coordinates.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_coordinate(out, coordinate, is_3d);
    }
    out.push(')');
}

fn write_coordinate(out: &mut String, coordinate: &Coordinate, is_3d: bool) {
    let _ = write!(
        out,
        "{} {}",
        format_number(coordinate.longitude()),
        format_number(coordinate.latitude())
    );
    if is_3d {
        let _ = write!(out, " {}", format_number(coordinate.altitude().unwrap_or(0.0)));
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use geokit_types::{latlon, BoundingBox, GeometryType};

    use super::*;

    #[test]
    fn round_trip() {
        let cases = [
            "POINT (30 10)",
            "POINT Z (30.12345 -10.5 12)",
            "LINESTRING (30 10, 10 30, 40 40)",
            "POLYGON ((35 10, 45 45, 15 40, 10 20, 35 10), (20 30, 35 35, 30 20, 20 30))",
            "MULTIPOINT ((10 40), (40 30), (20 20), (30 10))",
            "MULTILINESTRING ((10 10, 20 20, 10 40), (40 40, 30 30, 40 20, 30 10))",
            "MULTIPOLYGON (((40 40, 20 45, 45 30, 40 40)), ((20 35, 10 30, 10 10, 30 5, 45 20, 20 35), (30 20, 20 15, 20 25, 30 20)))",
            "GEOMETRYCOLLECTION (POINT (40 10), LINESTRING (10 10, 20 20, 10 40))",
            "GEOMETRYCOLLECTION EMPTY",
            "LINESTRING EMPTY",
        ];

        for wkt in cases {
            let geometry = parse_geometry(wkt).unwrap();
            assert_eq!(to_wkt(&geometry), wkt);
        }
    }

    #[test]
    fn axis_order() {
        let geometry = parse_geometry("POINT(10 20)").unwrap();
        let point = Point::try_from(geometry).unwrap();
        assert_eq!(point.coordinate, latlon!(20.0, 10.0));
    }

    #[test]
    fn lenient_input() {
        let geometry = parse_geometry("  multipoint((1 2),(3 4))  ").unwrap();
        assert_eq!(geometry.geometry_type(), GeometryType::MultiPoint);
        assert_eq!(geometry.num_points(), 2);

        let geometry = parse_geometry("SRID=4326;point z (1 2 3)").unwrap();
        assert!(geometry.is_3d());

        let geometry = parse_geometry("LINESTRING M (1 2 7, 3 4 8)").unwrap();
        assert!(!geometry.is_3d());

        let geometry = parse_geometry("POINT ZM (1 2 3 4)").unwrap();
        let point = Point::try_from(geometry).unwrap();
        assert_eq!(point.coordinate.altitude(), Some(3.0));
    }

    #[test]
    fn malformed_input() {
        assert_matches!(parse_geometry("POINT (1)"), Err(GeoKitError::Parse(_)));
        assert_matches!(parse_geometry("POINT (1 2"), Err(GeoKitError::Parse(_)));
        assert_matches!(parse_geometry("CIRCLE (1 2)"), Err(GeoKitError::Parse(_)));
        assert_matches!(parse_geometry("POINT EMPTY"), Err(GeoKitError::Parse(_)));
        assert_matches!(parse_geometry("MULTIPOINT ((1 2), EMPTY)"), Err(GeoKitError::Parse(_)));
    }

    #[test]
    fn precision() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.000001), "0");
        assert_eq!(format_number(12.3456789), "12.34568");
        assert_eq!(format_number(-5.5), "-5.5");
    }

    #[test]
    fn bounding_box_as_polygon() {
        let geometry: Geometry = BoundingBox::from_edges(10.0, 0.0, 20.0, 0.0).into();
        assert_eq!(to_wkt(&geometry), "POLYGON ((0 0, 20 0, 20 10, 0 10, 0 0))");
    }

    #[test]
    fn dataset_io() {
        let reader = WktReader::default();
        let dataset = reader.read_str("LINESTRING (0 0, 10 10)");
        assert!(dataset.error.is_none());
        let bounds = dataset.bounding_box.unwrap();
        assert_abs_diff_eq!(bounds.east(), 10.0);

        let dataset = reader.read_str("LINESTRING (0 0, ");
        assert!(dataset.error.is_some());
        assert!(dataset.geometries.is_empty());

        let mut two = SpatialDataSet::from_geometries(vec![
            Point::new(latlon!(1.0, 2.0)).into(),
            Point::new(latlon!(3.0, 4.0)).into(),
        ]);
        assert_eq!(
            WktWriter.write_string(&two).unwrap(),
            "GEOMETRYCOLLECTION (POINT (2 1), POINT (4 3))"
        );
        two.geometries.clear();
        assert_eq!(WktWriter.write_string(&two).unwrap(), "GEOMETRYCOLLECTION EMPTY");
    }
}
