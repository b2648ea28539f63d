use bytes::Bytes;
use geokit_types::orient::{ring_winding, Winding};
use geokit_types::{
    BoundingBox, Coordinate, CoordinateCollection, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use log::{debug, warn};

use crate::binary::{BinaryReader, ByteOrder};
use crate::error::GeoKitError;

/// File code every shapefile starts with.
pub const FILE_CODE: i32 = 9994;

const HEADER_LENGTH: usize = 100;
const RECORD_HEADER_LENGTH: usize = 8;

/// Geometry kind of a shapefile record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShapeType {
    /// Record without geometry.
    Null,
    /// Single point.
    Point,
    /// One or more lines.
    PolyLine,
    /// One or more rings.
    Polygon,
    /// Set of points.
    MultiPoint,
}

/// Dimensionality of the record coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Measures {
    Xy,
    Xyz,
    Xym,
}

impl ShapeType {
    fn from_code(code: i32) -> Result<(Self, Measures), GeoKitError> {
        let value = match code {
            0 => (Self::Null, Measures::Xy),
            1 => (Self::Point, Measures::Xy),
            3 => (Self::PolyLine, Measures::Xy),
            5 => (Self::Polygon, Measures::Xy),
            8 => (Self::MultiPoint, Measures::Xy),
            11 => (Self::Point, Measures::Xyz),
            13 => (Self::PolyLine, Measures::Xyz),
            15 => (Self::Polygon, Measures::Xyz),
            18 => (Self::MultiPoint, Measures::Xyz),
            21 => (Self::Point, Measures::Xym),
            23 => (Self::PolyLine, Measures::Xym),
            25 => (Self::Polygon, Measures::Xym),
            28 => (Self::MultiPoint, Measures::Xym),
            31 => {
                return Err(GeoKitError::UnsupportedKind(
                    "shapefile MultiPatch geometries are not supported".into(),
                ))
            }
            code => {
                return Err(GeoKitError::UnsupportedKind(format!(
                    "unknown shapefile shape type {code}"
                )))
            }
        };

        Ok(value)
    }
}

/// Content of a `.shp` file.
#[derive(Debug)]
pub(crate) struct ShpFile {
    /// Extent declared in the file header, if the file has any shapes.
    pub bounds: Option<BoundingBox>,
    /// Geometry of every record in file order. Null shapes are `None`.
    pub records: Vec<Option<Geometry>>,
}

/// Parses the main file of a shapefile.
pub(crate) fn parse_shp(data: &[u8]) -> Result<ShpFile, GeoKitError> {
    let mut reader = BinaryReader::new(Bytes::copy_from_slice(data));
    if reader.remaining() < HEADER_LENGTH {
        return Err(GeoKitError::Format("shapefile header is truncated".into()));
    }

    let file_code = reader.read_i32(ByteOrder::BigEndian)?;
    if file_code != FILE_CODE {
        return Err(GeoKitError::Format(format!(
            "invalid shapefile file code {file_code}, expected {FILE_CODE}"
        )));
    }

    reader.skip(20)?;
    let file_length = reader.read_i32(ByteOrder::BigEndian)? as usize * 2;
    let version = reader.read_i32(ByteOrder::LittleEndian)?;
    let (shape_type, _) = ShapeType::from_code(reader.read_i32(ByteOrder::LittleEndian)?)?;
    debug!("Reading shapefile version {version} of {shape_type:?} shapes, {file_length} bytes");

    let min_x = reader.read_f64(ByteOrder::LittleEndian)?;
    let min_y = reader.read_f64(ByteOrder::LittleEndian)?;
    let max_x = reader.read_f64(ByteOrder::LittleEndian)?;
    let max_y = reader.read_f64(ByteOrder::LittleEndian)?;
    // Z and M ranges.
    reader.skip(32)?;

    let mut records = vec![];
    while reader.remaining() >= RECORD_HEADER_LENGTH {
        let number = reader.read_i32(ByteOrder::BigEndian)?;
        let length = reader.read_i32(ByteOrder::BigEndian)?;
        if length < 2 {
            return Err(GeoKitError::Format(format!(
                "shapefile record {number} has invalid content length {length}"
            )));
        }

        let content = reader.read_bytes(length as usize * 2)?;
        records.push(parse_record(BinaryReader::new(content))?);
    }

    let has_shapes = records.iter().any(Option::is_some);
    let is_finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
    let bounds = (has_shapes && is_finite).then(|| BoundingBox::from_edges(max_y, min_y, max_x, min_x));

    Ok(ShpFile { bounds, records })
}

fn parse_record(mut reader: BinaryReader<Bytes>) -> Result<Option<Geometry>, GeoKitError> {
    let (shape_type, measures) = ShapeType::from_code(reader.read_i32(ByteOrder::LittleEndian)?)?;
    let geometry = match shape_type {
        ShapeType::Null => return Ok(None),
        ShapeType::Point => {
            let x = reader.read_f64(ByteOrder::LittleEndian)?;
            let y = reader.read_f64(ByteOrder::LittleEndian)?;
            let z = match measures {
                Measures::Xyz => Some(reader.read_f64(ByteOrder::LittleEndian)?),
                _ => None,
            };
            Point::new(Coordinate::from_parts(y, x, z)).into()
        }
        ShapeType::MultiPoint => {
            // Bounding box.
            reader.skip(32)?;
            let count = read_count(&mut reader, 16)?;
            let coordinates = read_points(&mut reader, count, measures)?;
            MultiPoint::new(coordinates.into_iter().map(Point::new).collect()).into()
        }
        ShapeType::PolyLine | ShapeType::Polygon => {
            reader.skip(32)?;
            let part_count = read_count(&mut reader, 4)?;
            let point_count = read_count(&mut reader, 16)?;
            let mut parts = Vec::with_capacity(part_count);
            for _ in 0..part_count {
                parts.push(reader.read_i32(ByteOrder::LittleEndian)?);
            }

            let coordinates = read_points(&mut reader, point_count, measures)?;
            let parts = split_parts(coordinates, &parts)?;
            if shape_type == ShapeType::PolyLine {
                lines(parts)
            } else {
                assemble_polygons(parts)
            }
        }
    };

    Ok(Some(geometry))
}

/// Reads an element count, checking that the rest of the record can hold that many elements of the given size.
fn read_count(reader: &mut BinaryReader<Bytes>, element_size: usize) -> Result<usize, GeoKitError> {
    let count = reader.read_i32(ByteOrder::LittleEndian)?;
    match usize::try_from(count) {
        Ok(count) if count.saturating_mul(element_size) <= reader.remaining() => Ok(count),
        _ => Err(GeoKitError::Format(format!(
            "invalid element count {count} in shapefile record"
        ))),
    }
}

/// Reads `count` XY pairs followed, for 3d records, by the Z range and Z values. M values are left unread.
fn read_points(
    reader: &mut BinaryReader<Bytes>,
    count: usize,
    measures: Measures,
) -> Result<Vec<Coordinate>, GeoKitError> {
    let mut xy = Vec::with_capacity(count);
    for _ in 0..count {
        let x = reader.read_f64(ByteOrder::LittleEndian)?;
        let y = reader.read_f64(ByteOrder::LittleEndian)?;
        xy.push((x, y));
    }

    if measures != Measures::Xyz {
        return Ok(xy.into_iter().map(|(x, y)| Coordinate::new(y, x)).collect());
    }

    reader.skip(16)?;
    let mut coordinates = Vec::with_capacity(count);
    for (x, y) in xy {
        let z = reader.read_f64(ByteOrder::LittleEndian)?;
        coordinates.push(Coordinate::with_altitude(y, x, z));
    }

    Ok(coordinates)
}

fn split_parts(coordinates: Vec<Coordinate>, parts: &[i32]) -> Result<Vec<Vec<Coordinate>>, GeoKitError> {
    let mut result = Vec::with_capacity(parts.len());
    for (index, start) in parts.iter().enumerate() {
        let end = parts.get(index + 1).copied().unwrap_or(coordinates.len() as i32);
        let range = usize::try_from(*start)
            .ok()
            .zip(usize::try_from(end).ok())
            .filter(|(start, end)| start <= end && *end <= coordinates.len());
        let Some((start, end)) = range else {
            return Err(GeoKitError::Format(format!(
                "invalid part offsets {start}..{end} in shapefile record"
            )));
        };
        result.push(coordinates[start..end].to_vec());
    }

    Ok(result)
}

fn lines(parts: Vec<Vec<Coordinate>>) -> Geometry {
    let mut lines: Vec<LineString> = parts.into_iter().map(LineString::new).collect();
    if lines.len() == 1 {
        lines.remove(0).into()
    } else {
        MultiLineString::new(lines).into()
    }
}

/// Groups the rings of a polygon record into polygons.
///
/// A clockwise ring starts a new polygon, a counterclockwise ring is a hole of the last started polygon.
pub(crate) fn assemble_polygons(rings: Vec<Vec<Coordinate>>) -> Geometry {
    let mut polygons: Vec<Polygon> = vec![];
    for ring in rings {
        let ring = CoordinateCollection::from(ring);
        match (ring_winding(&ring), polygons.last_mut()) {
            (Some(Winding::CounterClockwise), Some(polygon)) => polygon.interior_rings.push(ring),
            (winding, _) => {
                if winding != Some(Winding::Clockwise) {
                    warn!("Shapefile ring with {winding:?} winding does not follow an outer ring, reading it as one");
                }
                polygons.push(Polygon::new(ring));
            }
        }
    }

    if polygons.len() == 1 {
        polygons.remove(0).into()
    } else {
        MultiPolygon::new(polygons).into()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;
    use geokit_types::latlon;

    use super::*;
    use crate::binary::BinaryWriter;

    /// Builds a shapefile from `(shape type, record content)` pairs. Content must not include the shape type.
    pub(crate) fn build_shp(shape_type: i32, records: &[(i32, Vec<u8>)]) -> Vec<u8> {
        let mut body = BinaryWriter::new();
        for (index, (record_type, content)) in records.iter().enumerate() {
            body.write_i32(index as i32 + 1, ByteOrder::BigEndian);
            body.write_i32((content.len() as i32 + 4) / 2, ByteOrder::BigEndian);
            body.write_i32(*record_type, ByteOrder::LittleEndian);
            body.write_bytes(content);
        }
        let body = body.into_bytes();

        let mut file = BinaryWriter::new();
        file.write_i32(FILE_CODE, ByteOrder::BigEndian);
        file.write_bytes(&[0; 20]);
        file.write_i32(((HEADER_LENGTH + body.len()) / 2) as i32, ByteOrder::BigEndian);
        file.write_i32(1000, ByteOrder::LittleEndian);
        file.write_i32(shape_type, ByteOrder::LittleEndian);
        for value in [-180.0, -90.0, 180.0, 90.0, 0.0, 0.0, 0.0, 0.0] {
            file.write_f64(value, ByteOrder::LittleEndian);
        }
        file.write_bytes(&body);
        file.into_bytes().to_vec()
    }

    /// Content of a PolyLine or Polygon record with the given `(x, y)` parts.
    pub(crate) fn parts_content(parts: &[&[(f64, f64)]]) -> Vec<u8> {
        let mut content = BinaryWriter::new();
        for value in [0.0; 4] {
            content.write_f64(value, ByteOrder::LittleEndian);
        }
        let point_count: usize = parts.iter().map(|p| p.len()).sum();
        content.write_i32(parts.len() as i32, ByteOrder::LittleEndian);
        content.write_i32(point_count as i32, ByteOrder::LittleEndian);
        let mut offset = 0;
        for part in parts {
            content.write_i32(offset, ByteOrder::LittleEndian);
            offset += part.len() as i32;
        }
        for (x, y) in parts.iter().flat_map(|p| p.iter()) {
            content.write_f64(*x, ByteOrder::LittleEndian);
            content.write_f64(*y, ByteOrder::LittleEndian);
        }
        content.into_bytes().to_vec()
    }

    pub(crate) fn point_content(x: f64, y: f64) -> Vec<u8> {
        let mut content = BinaryWriter::new();
        content.write_f64(x, ByteOrder::LittleEndian);
        content.write_f64(y, ByteOrder::LittleEndian);
        content.into_bytes().to_vec()
    }

    const OUTER_CW: &[(f64, f64)] = &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)];
    const HOLE_CCW: &[(f64, f64)] = &[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)];
    const OUTER2_CW: &[(f64, f64)] = &[(20.0, 0.0), (20.0, 5.0), (25.0, 5.0), (25.0, 0.0), (20.0, 0.0)];

    #[test]
    fn polygon_assembly() {
        let data = build_shp(5, &[(5, parts_content(&[OUTER_CW, HOLE_CCW, OUTER2_CW]))]);
        let shp = parse_shp(&data).unwrap();
        assert_eq!(shp.records.len(), 1);

        let Some(Geometry::MultiPolygon(multi)) = &shp.records[0] else {
            panic!("multi polygon expected");
        };
        assert_eq!(multi.polygons.len(), 2);
        assert_eq!(multi.polygons[0].interior_rings.len(), 1);
        assert_eq!(multi.polygons[0].interior_rings[0][1], latlon!(2.0, 4.0));
        assert!(multi.polygons[1].interior_rings.is_empty());
        assert_eq!(multi.polygons[1].exterior_ring[0], latlon!(0.0, 20.0));

        let data = build_shp(5, &[(5, parts_content(&[OUTER_CW, HOLE_CCW]))]);
        let shp = parse_shp(&data).unwrap();
        assert_matches!(&shp.records[0], Some(Geometry::Polygon(p)) if p.interior_rings.len() == 1);
    }

    #[test]
    fn points_and_lines() {
        let data = build_shp(
            3,
            &[
                (3, parts_content(&[&[(1.0, 2.0), (3.0, 4.0)]])),
                (3, parts_content(&[&[(1.0, 2.0), (3.0, 4.0)], &[(5.0, 6.0), (7.0, 8.0)]])),
                (0, vec![]),
                (1, point_content(30.0, 60.0)),
            ],
        );
        let shp = parse_shp(&data).unwrap();
        assert_eq!(shp.records.len(), 4);
        assert_matches!(&shp.records[0], Some(Geometry::LineString(l)) if l.vertices[1] == latlon!(4.0, 3.0));
        assert_matches!(&shp.records[1], Some(Geometry::MultiLineString(m)) if m.line_strings.len() == 2);
        assert!(shp.records[2].is_none());
        assert_matches!(&shp.records[3], Some(Geometry::Point(p)) if p.coordinate == latlon!(60.0, 30.0));
        assert!(shp.bounds.is_some());
    }

    #[test]
    fn point_z() {
        let mut content = BinaryWriter::new();
        for value in [1.0, 2.0, 3.0, 4.0] {
            content.write_f64(value, ByteOrder::LittleEndian);
        }
        let data = build_shp(11, &[(11, content.into_bytes().to_vec())]);
        let shp = parse_shp(&data).unwrap();
        assert_matches!(&shp.records[0], Some(Geometry::Point(p)) if p.coordinate == latlon!(2.0, 1.0, 3.0));
    }

    #[test]
    fn invalid_files() {
        let mut data = build_shp(1, &[(1, point_content(1.0, 2.0))]);
        data[3] = 0;
        assert_matches!(parse_shp(&data), Err(GeoKitError::Format(_)));

        assert_matches!(parse_shp(&data[..50]), Err(GeoKitError::Format(_)));

        let data = build_shp(31, &[]);
        assert_matches!(parse_shp(&data), Err(GeoKitError::UnsupportedKind(_)));

        let data = build_shp(1, &[(31, point_content(1.0, 2.0))]);
        assert_matches!(parse_shp(&data), Err(GeoKitError::UnsupportedKind(_)));

        let mut content = parts_content(&[&[(1.0, 2.0), (3.0, 4.0)]]);
        // Part count.
        content[32] = 0xff;
        let data = build_shp(3, &[(3, content)]);
        assert_matches!(parse_shp(&data), Err(GeoKitError::Format(_)));
    }
}
