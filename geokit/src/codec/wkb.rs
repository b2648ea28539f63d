//! Well-Known-Binary reader and writer.
//!
//! Every (nested) geometry starts with its own byte order flag followed by the type code. Dimensionality is encoded
//! in the type code: values above 1000 and below 2000 carry Z, values between 2000 and 3000 carry M and values above
//! 3000 carry both. The PostGIS extended flags (`0x80000000` for Z, `0x40000000` for M, `0x20000000` for an embedded
//! SRID) are understood as well. M values are read and dropped.
//!
//! The writer uses little-endian byte order and adds 1000 to the type code of 3d geometries.

use std::io::Write;

use bytes::{Buf, Bytes};
use geokit_types::{
    Coordinate, CoordinateCollection, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon, Shape, SpatialDataSet,
};

use crate::binary::{BinaryReader, BinaryWriter, ByteOrder};
use crate::codec::{ReadOptions, SpatialReader, SpatialWriter};
use crate::error::GeoKitError;

const EWKB_Z_FLAG: u32 = 0x8000_0000;
const EWKB_M_FLAG: u32 = 0x4000_0000;
const EWKB_SRID_FLAG: u32 = 0x2000_0000;

const WKB_POINT: u32 = 1;
const WKB_LINE_STRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTI_POINT: u32 = 4;
const WKB_MULTI_LINE_STRING: u32 = 5;
const WKB_MULTI_POLYGON: u32 = 6;
const WKB_GEOMETRY_COLLECTION: u32 = 7;

/// Reader of a single WKB geometry.
#[derive(Debug, Clone, Default)]
pub struct WkbReader {
    options: ReadOptions,
}

impl WkbReader {
    /// Creates a new reader.
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }
}

impl SpatialReader for WkbReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let geometry = parse_geometry(data)?;
        let mut dataset = SpatialDataSet::from_geometries(vec![geometry]);
        self.options.finish(&mut dataset);
        Ok(dataset)
    }
}

/// Writer of WKB. A dataset with one geometry is written as that geometry, any other dataset as a geometry
/// collection.
#[derive(Debug, Clone, Default)]
pub struct WkbWriter;

impl SpatialWriter for WkbWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        let bytes = match data.geometries.as_slice() {
            [single] => to_wkb(single),
            geometries => {
                let mut writer = BinaryWriter::new();
                let is_3d = geometries.first().is_some_and(|g| g.is_3d());
                write_header(&mut writer, WKB_GEOMETRY_COLLECTION, is_3d);
                writer.write_u32(geometries.len() as u32, ByteOrder::LittleEndian);
                for geometry in geometries {
                    write_geometry(&mut writer, geometry);
                }
                writer.into_bytes()
            }
        };

        out.write_all(&bytes)?;
        Ok(())
    }
}

/// Parses a WKB geometry. Trailing bytes after the geometry are ignored.
pub fn parse_geometry(data: &[u8]) -> Result<Geometry, GeoKitError> {
    let mut reader = BinaryReader::new(data);
    read_geometry(&mut reader)
}

/// Converts the geometry into little-endian WKB.
pub fn to_wkb(geometry: &Geometry) -> Bytes {
    let mut writer = BinaryWriter::new();
    write_geometry(&mut writer, geometry);
    writer.into_bytes()
}

#[derive(Debug, Copy, Clone)]
struct Header {
    order: ByteOrder,
    kind: u32,
    has_z: bool,
    has_m: bool,
}

fn read_header<B: Buf>(reader: &mut BinaryReader<B>) -> Result<Header, GeoKitError> {
    let order = ByteOrder::from_flag(reader.read_u8()?)?;
    let code = reader.read_u32(order)?;

    let mut has_z = code & EWKB_Z_FLAG != 0;
    let mut has_m = code & EWKB_M_FLAG != 0;
    if code & EWKB_SRID_FLAG != 0 {
        reader.skip(4)?;
    }

    let mut kind = code & 0x0FFF_FFFF;
    if kind > 3000 {
        has_z = true;
        has_m = true;
        kind -= 3000;
    } else if kind > 2000 {
        has_m = true;
        kind -= 2000;
    } else if kind > 1000 {
        has_z = true;
        kind -= 1000;
    }

    Ok(Header {
        order,
        kind,
        has_z,
        has_m,
    })
}

fn read_geometry<B: Buf>(reader: &mut BinaryReader<B>) -> Result<Geometry, GeoKitError> {
    let header = read_header(reader)?;

    let geometry = match header.kind {
        WKB_POINT => Point::new(read_coordinate(reader, &header)?).into(),
        WKB_LINE_STRING => LineString::new(read_coordinates(reader, &header)?).into(),
        WKB_POLYGON => read_polygon(reader, &header)?.into(),
        WKB_MULTI_POINT => MultiPoint::new(read_members(reader, &header, |g| Point::try_from(g))?).into(),
        WKB_MULTI_LINE_STRING => {
            MultiLineString::new(read_members(reader, &header, |g| LineString::try_from(g))?).into()
        }
        WKB_MULTI_POLYGON => MultiPolygon::new(read_members(reader, &header, |g| Polygon::try_from(g))?).into(),
        WKB_GEOMETRY_COLLECTION => GeometryCollection::new(read_members(reader, &header, Ok)?).into(),
        other => return Err(GeoKitError::UnsupportedKind(format!("WKB geometry type {other}"))),
    };

    Ok(geometry)
}

fn read_count<B: Buf>(reader: &mut BinaryReader<B>, order: ByteOrder) -> Result<usize, GeoKitError> {
    let count = reader.read_u32(order)? as usize;
    // Every element takes at least 16 bytes, so a larger count means a corrupted document.
    if count > reader.remaining() {
        return Err(GeoKitError::Format(format!(
            "element count {count} exceeds the size of the data"
        )));
    }

    Ok(count)
}

fn read_members<B: Buf, T>(
    reader: &mut BinaryReader<B>,
    header: &Header,
    convert: impl Fn(Geometry) -> Result<T, geokit_types::GeoKitTypesError>,
) -> Result<Vec<T>, GeoKitError> {
    let count = read_count(reader, header.order)?;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        members.push(convert(read_geometry(reader)?)?);
    }

    Ok(members)
}

fn read_polygon<B: Buf>(reader: &mut BinaryReader<B>, header: &Header) -> Result<Polygon, GeoKitError> {
    let count = read_count(reader, header.order)?;
    let mut rings = Vec::with_capacity(count);
    for _ in 0..count {
        rings.push(read_coordinates(reader, header)?);
    }

    let mut rings = rings.into_iter();
    let exterior = rings.next().unwrap_or_default();
    Ok(Polygon::with_holes(exterior, rings.collect()))
}

fn read_coordinates<B: Buf>(
    reader: &mut BinaryReader<B>,
    header: &Header,
) -> Result<CoordinateCollection, GeoKitError> {
    let count = read_count(reader, header.order)?;
    let mut coordinates = Vec::with_capacity(count);
    for _ in 0..count {
        coordinates.push(read_coordinate(reader, header)?);
    }

    Ok(coordinates.into())
}

fn read_coordinate<B: Buf>(reader: &mut BinaryReader<B>, header: &Header) -> Result<Coordinate, GeoKitError> {
    let x = reader.read_f64(header.order)?;
    let y = reader.read_f64(header.order)?;
    let z = if header.has_z {
        Some(reader.read_f64(header.order)?)
    } else {
        None
    };
    if header.has_m {
        reader.read_f64(header.order)?;
    }

    Ok(Coordinate::from_parts(y, x, z))
}

fn write_header(writer: &mut BinaryWriter, kind: u32, is_3d: bool) {
    writer.write_u8(ByteOrder::LittleEndian.flag());
    writer.write_u32(if is_3d { kind + 1000 } else { kind }, ByteOrder::LittleEndian);
}

fn write_geometry(writer: &mut BinaryWriter, geometry: &Geometry) {
    let is_3d = geometry.is_3d();
    match geometry {
        Geometry::Point(point) => write_point(writer, point, is_3d),
        Geometry::LineString(line) => {
            write_header(writer, WKB_LINE_STRING, is_3d);
            write_coordinates(writer, &line.vertices, is_3d);
        }
        Geometry::Polygon(polygon) => write_polygon(writer, polygon, is_3d),
        Geometry::MultiPoint(multi) => {
            write_header(writer, WKB_MULTI_POINT, is_3d);
            writer.write_u32(multi.points.len() as u32, ByteOrder::LittleEndian);
            for point in &multi.points {
                write_point(writer, point, is_3d);
            }
        }
        Geometry::MultiLineString(multi) => {
            write_header(writer, WKB_MULTI_LINE_STRING, is_3d);
            writer.write_u32(multi.line_strings.len() as u32, ByteOrder::LittleEndian);
            for line in &multi.line_strings {
                write_header(writer, WKB_LINE_STRING, is_3d);
                write_coordinates(writer, &line.vertices, is_3d);
            }
        }
        Geometry::MultiPolygon(multi) => {
            write_header(writer, WKB_MULTI_POLYGON, is_3d);
            writer.write_u32(multi.polygons.len() as u32, ByteOrder::LittleEndian);
            for polygon in &multi.polygons {
                write_polygon(writer, polygon, is_3d);
            }
        }
        Geometry::GeometryCollection(collection) => {
            write_header(writer, WKB_GEOMETRY_COLLECTION, is_3d);
            writer.write_u32(collection.geometries.len() as u32, ByteOrder::LittleEndian);
            for member in &collection.geometries {
                write_geometry(writer, member);
            }
        }
        Geometry::BoundingBox(bounds) => write_polygon(writer, &bounds.bounds.to_polygon(), false),
    }
}

fn write_point(writer: &mut BinaryWriter, point: &Point, is_3d: bool) {
    write_header(writer, WKB_POINT, is_3d);
    write_coordinate(writer, &point.coordinate, is_3d);
}

fn write_polygon(writer: &mut BinaryWriter, polygon: &Polygon, is_3d: bool) {
    write_header(writer, WKB_POLYGON, is_3d);
    if polygon.exterior_ring.is_empty() {
        writer.write_u32(0, ByteOrder::LittleEndian);
        return;
    }

    writer.write_u32(polygon.rings().count() as u32, ByteOrder::LittleEndian);
    for ring in polygon.rings() {
        write_coordinates(writer, ring, is_3d);
    }
}

fn write_coordinates(writer: &mut BinaryWriter, coordinates: &[Coordinate], is_3d: bool) {
    writer.write_u32(coordinates.len() as u32, ByteOrder::LittleEndian);
    for coordinate in coordinates {
        write_coordinate(writer, coordinate, is_3d);
    }
}

fn write_coordinate(writer: &mut BinaryWriter, coordinate: &Coordinate, is_3d: bool) {
    writer.write_f64(coordinate.longitude(), ByteOrder::LittleEndian);
    writer.write_f64(coordinate.latitude(), ByteOrder::LittleEndian);
    if is_3d {
        writer.write_f64(coordinate.altitude().unwrap_or(0.0), ByteOrder::LittleEndian);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use geokit_types::{latlon, GeometryType};

    use super::*;

    fn round_trip(geometry: Geometry) {
        let bytes = to_wkb(&geometry);
        let parsed = parse_geometry(&bytes).unwrap();
        assert_eq!(parsed, geometry);
        assert_eq!(parsed.is_3d(), geometry.is_3d());
    }

    #[test]
    fn round_trips() {
        round_trip(Point::new(latlon!(10.0, 20.0)).into());
        round_trip(Point::new(latlon!(10.0, 20.0, 5.0)).into());
        round_trip(LineString::new(vec![latlon!(1.0, 2.0, 3.0), latlon!(4.0, 5.0, 6.0)]).into());
        round_trip(
            Polygon::with_holes(
                vec![
                    latlon!(0.0, 0.0),
                    latlon!(0.0, 10.0),
                    latlon!(10.0, 10.0),
                    latlon!(0.0, 0.0),
                ],
                vec![vec![latlon!(1.0, 1.0), latlon!(2.0, 2.0), latlon!(1.0, 2.0), latlon!(1.0, 1.0)].into()],
            )
            .into(),
        );
        round_trip(MultiPoint::new(vec![Point::new(latlon!(1.0, 1.0)), Point::new(latlon!(2.0, 2.0))]).into());
        round_trip(
            MultiLineString::new(vec![LineString::new(vec![latlon!(1.0, 1.0), latlon!(2.0, 2.0)])]).into(),
        );
        round_trip(
            GeometryCollection::new(vec![
                Point::new(latlon!(1.0, 1.0)).into(),
                LineString::new(vec![latlon!(1.0, 1.0), latlon!(2.0, 2.0)]).into(),
            ])
            .into(),
        );
    }

    #[test]
    fn big_endian_point() {
        let bytes = [
            0x00, 0x00, 0x00, 0x00, 0x01, 0x40, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x34, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00,
        ];
        let point = Point::try_from(parse_geometry(&bytes).unwrap()).unwrap();
        assert_eq!(point.coordinate, latlon!(20.0, 10.0));
    }

    #[test]
    fn dimension_codes() {
        let mut writer = BinaryWriter::new();
        writer.write_u8(1);
        writer.write_u32(3001, ByteOrder::LittleEndian);
        for value in [1.0, 2.0, 3.0, 4.0] {
            writer.write_f64(value, ByteOrder::LittleEndian);
        }
        let point = Point::try_from(parse_geometry(&writer.into_bytes()).unwrap()).unwrap();
        assert_eq!(point.coordinate, latlon!(2.0, 1.0, 3.0));

        let mut writer = BinaryWriter::new();
        writer.write_u8(1);
        writer.write_u32(2001, ByteOrder::LittleEndian);
        for value in [1.0, 2.0, 4.0] {
            writer.write_f64(value, ByteOrder::LittleEndian);
        }
        let point = Point::try_from(parse_geometry(&writer.into_bytes()).unwrap()).unwrap();
        assert_eq!(point.coordinate, latlon!(2.0, 1.0));

        let bytes = to_wkb(&Point::new(latlon!(1.0, 2.0, 3.0)).into());
        assert_eq!(&bytes[1..5], &1001u32.to_le_bytes());
    }

    #[test]
    fn malformed() {
        assert_matches!(parse_geometry(&[1, 1, 0, 0]), Err(GeoKitError::Format(_)));
        assert_matches!(parse_geometry(&[3]), Err(GeoKitError::Format(_)));
        assert_matches!(
            parse_geometry(&[1, 9, 0, 0, 0]),
            Err(GeoKitError::UnsupportedKind(_))
        );

        let dataset = WkbReader::default().read(&[1, 2, 0, 0, 0, 255, 255, 255, 0]);
        assert!(dataset.error.is_some());
    }

    #[test]
    fn multi_member_kind_is_checked() {
        let mut writer = BinaryWriter::new();
        write_header(&mut writer, WKB_MULTI_POINT, false);
        writer.write_u32(1, ByteOrder::LittleEndian);
        write_header(&mut writer, WKB_LINE_STRING, false);
        writer.write_u32(0, ByteOrder::LittleEndian);
        assert_matches!(parse_geometry(&writer.into_bytes()), Err(GeoKitError::Geometry(_)));
        assert_eq!(GeometryType::MultiPoint.name(), "MultiPoint");
    }
}
