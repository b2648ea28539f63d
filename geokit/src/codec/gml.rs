//! GML reader and writer.
//!
//! The reader understands the simple geometries of GML 2 and GML 3: `Point`, `LineString`, `LinearRing`, `Polygon`,
//! `Envelope`/`Box`, their multi variants (including `MultiCurve` and `MultiSurface`) and `MultiGeometry`. The GML 3
//! `pos` and `posList` values are read in `lat lon [alt]` order with the number of values per position given by
//! the `srsDimension` (or `dimension`) attribute. The GML 2 `coordinates` element is read as comma-separated
//! `lon,lat[,alt]` tuples.
//!
//! The same functions are used for the GML embedded into GeoRSS `where` elements.

use std::io::Write;

use geokit_types::{
    Attributed, BoundingBox, Coordinate, CoordinateCollection, Geometry, GeometryCollection, LineString,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, PropertyValue, Shape, ShapeMetadata, SpatialDataSet,
};
use log::warn;

use crate::codec::{ReadOptions, SpatialReader, SpatialWriter, TextWriter, UriReader};
use crate::error::GeoKitError;
use crate::codec::wkt::format_number;
use crate::xml::{parse_document, XmlElement, XmlWriter, GML_NAMESPACE};

/// GML reader.
#[derive(Debug, Clone, Default)]
pub struct GmlReader {
    options: ReadOptions,
}

impl GmlReader {
    /// Creates a new reader.
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }

    fn read_feature(&self, feature: &XmlElement) -> Result<Option<Geometry>, GeoKitError> {
        let Some(mut geometry) = find_geometry(feature)? else {
            warn!("Skipping feature <{}> without geometry", feature.name);
            return Ok(None);
        };

        let mut metadata = ShapeMetadata::new();
        metadata.id = feature.attr("id").or_else(|| feature.attr("fid")).map(String::from);
        for child in feature.elements() {
            if child.elements().next().is_some() {
                continue;
            }

            let Some(value) = child.value(self.options.strip_html) else {
                continue;
            };
            match child.name.as_str() {
                "name" => metadata.title = Some(value),
                "description" => metadata.description = Some(value),
                _ => {
                    metadata
                        .properties
                        .insert(child.name.clone(), PropertyValue::String(value));
                }
            }
        }

        if metadata.has_metadata() || metadata.id.is_some() {
            *geometry.metadata_mut() = Some(metadata);
        }

        Ok(Some(geometry))
    }

    fn collect(&self, element: &XmlElement, target: &mut Vec<Geometry>) -> Result<(), GeoKitError> {
        for child in element.elements() {
            if child.is("boundedBy") {
                continue;
            }

            if child.is("featureMember") || child.is("featureMembers") {
                for feature in child.elements() {
                    target.extend(self.read_feature(feature)?);
                }
            } else if let Some(geometry) = read_geometry(child)? {
                target.push(geometry);
            } else {
                self.collect(child, target)?;
            }
        }

        Ok(())
    }
}

impl SpatialReader for GmlReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let root = parse_document(data)?;

        let mut dataset = SpatialDataSet::new();
        match read_geometry(&root)? {
            Some(geometry) => dataset.geometries.push(geometry),
            None => self.collect(&root, &mut dataset.geometries)?,
        }

        if let Some(bounds) = root.child("boundedBy").and_then(|b| b.elements().next()) {
            if let Some(Geometry::BoundingBox(shape)) = read_geometry(bounds)? {
                dataset.bounding_box = Some(shape.bounds);
            }
        }

        self.options.finish(&mut dataset);
        Ok(dataset)
    }
}

impl UriReader for GmlReader {}

/// GML 3 writer.
///
/// A dataset with a single geometry that has no metadata is written as a bare geometry. Other datasets are written
/// as a `gml:FeatureCollection` with one `gml:featureMember` per geometry.
#[derive(Debug, Clone, Default)]
pub struct GmlWriter;

impl SpatialWriter for GmlWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        let mut writer = XmlWriter::new(out);
        writer.declaration()?;

        if let [single] = data.geometries.as_slice() {
            if single.metadata().map(|m| !m.has_metadata() && m.id.is_none()).unwrap_or(true) {
                return write_geometry(&mut writer, single, true);
            }
        }

        writer.start("gml:FeatureCollection", &[("xmlns:gml", GML_NAMESPACE)])?;
        if let Some(bounds) = data.bounding_box {
            writer.start("gml:boundedBy", &[])?;
            write_envelope(&mut writer, &bounds, &[])?;
            writer.end("gml:boundedBy")?;
        }

        for geometry in &data.geometries {
            writer.start("gml:featureMember", &[])?;
            write_feature(&mut writer, geometry)?;
            writer.end("gml:featureMember")?;
        }

        writer.end("gml:FeatureCollection")
    }
}

impl TextWriter for GmlWriter {}

fn write_feature<W: Write>(writer: &mut XmlWriter<W>, geometry: &Geometry) -> Result<(), GeoKitError> {
    let metadata = geometry.metadata();
    let id = metadata.and_then(|m| m.id.as_deref());
    match id {
        Some(id) => writer.start("Feature", &[("gml:id", id)])?,
        None => writer.start("Feature", &[])?,
    }

    if let Some(metadata) = metadata {
        writer.optional_element("gml:name", metadata.title.as_deref())?;
        writer.optional_element("gml:description", metadata.description.as_deref())?;
    }

    writer.start("geometry", &[])?;
    write_geometry(writer, geometry, false)?;
    writer.end("geometry")?;

    if let Some(metadata) = metadata {
        for (key, value) in &metadata.properties {
            writer.text_element(&element_name(key), &value.to_string())?;
        }
    }

    writer.end("Feature")
}

/// Converts a property key into a valid XML element name.
pub(crate) fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }

    name
}

/// Reads a GML geometry element. Returns `None` if the element is not a geometry.
pub fn read_geometry(element: &XmlElement) -> Result<Option<Geometry>, GeoKitError> {
    let geometry = match element.name.as_str() {
        "Point" => {
            let Some(coordinate) = read_positions(element)?.into_iter().next() else {
                warn!("Skipping GML point without valid coordinates");
                return Ok(None);
            };
            Point::new(coordinate).into()
        }
        "LineString" | "LinearRing" => LineString::new(read_positions(element)?).into(),
        "Polygon" => read_polygon(element)?.into(),
        "Envelope" | "Box" => read_envelope(element)?.into(),
        "MultiPoint" => MultiPoint::new(read_members(element, &["pointMember", "pointMembers"])?).into(),
        "MultiLineString" | "MultiCurve" => MultiLineString::new(read_members(
            element,
            &["lineStringMember", "lineStringMembers", "curveMember", "curveMembers"],
        )?)
        .into(),
        "MultiPolygon" | "MultiSurface" => MultiPolygon::new(read_members(
            element,
            &["polygonMember", "polygonMembers", "surfaceMember", "surfaceMembers"],
        )?)
        .into(),
        "MultiGeometry" => {
            let mut geometries = vec![];
            for member in element.elements() {
                if member.is("geometryMember") || member.is("geometryMembers") {
                    for child in member.elements() {
                        geometries.extend(read_geometry(child)?);
                    }
                }
            }
            GeometryCollection::new(geometries).into()
        }
        _ => return Ok(None),
    };

    Ok(Some(geometry))
}

fn find_geometry(element: &XmlElement) -> Result<Option<Geometry>, GeoKitError> {
    for child in element.elements() {
        if let Some(geometry) = read_geometry(child)? {
            return Ok(Some(geometry));
        }
        if let Some(geometry) = find_geometry(child)? {
            return Ok(Some(geometry));
        }
    }

    Ok(None)
}

fn read_members<T: TryFrom<Geometry>>(element: &XmlElement, member_names: &[&str]) -> Result<Vec<T>, GeoKitError> {
    let mut members = vec![];
    for member in element.elements() {
        if !member_names.contains(&member.name.as_str()) {
            continue;
        }

        for child in member.elements() {
            let Some(geometry) = read_geometry(child)? else {
                continue;
            };
            let geometry_type = geometry.geometry_type();
            match T::try_from(geometry) {
                Ok(value) => members.push(value),
                Err(_) => warn!("Skipping {geometry_type} member of <{}>", element.name),
            }
        }
    }

    Ok(members)
}

fn read_polygon(element: &XmlElement) -> Result<Polygon, GeoKitError> {
    let ring = |boundary: &XmlElement| -> Result<CoordinateCollection, GeoKitError> {
        match boundary.child("LinearRing") {
            Some(ring) => read_positions(ring),
            None => read_positions(boundary),
        }
    };

    let exterior = match element
        .child("exterior")
        .or_else(|| element.child("outerBoundaryIs"))
    {
        Some(boundary) => ring(boundary)?,
        None => CoordinateCollection::default(),
    };

    let mut interiors = vec![];
    for boundary in element.elements() {
        if boundary.is("interior") || boundary.is("innerBoundaryIs") {
            interiors.push(ring(boundary)?);
        }
    }

    Ok(Polygon::with_holes(exterior, interiors))
}

fn read_envelope(element: &XmlElement) -> Result<BoundingBox, GeoKitError> {
    let corners = match (element.child("lowerCorner"), element.child("upperCorner")) {
        (Some(lower), Some(upper)) => {
            let envelope_dimension = dimension(element);
            let lower = parse_pos_list(&lower.text(), dimension(lower).or(envelope_dimension));
            let upper = parse_pos_list(&upper.text(), dimension(upper).or(envelope_dimension));
            lower.into_iter().chain(upper).collect::<Vec<_>>()
        }
        _ => read_positions(element)?.into_inner(),
    };

    match corners.as_slice() {
        [lower, upper] => Ok(BoundingBox::from_edges(
            upper.latitude(),
            lower.latitude(),
            upper.longitude(),
            lower.longitude(),
        )),
        _ => Err(GeoKitError::parse("GML envelope must have two corners")),
    }
}

fn dimension(element: &XmlElement) -> Option<usize> {
    element
        .attr("srsDimension")
        .or_else(|| element.attr("dimension"))
        .and_then(|v| v.trim().parse().ok())
}

/// Reads the positions of a simple geometry from its `posList`, `pos`, `coordinates` or `coord` children.
fn read_positions(element: &XmlElement) -> Result<CoordinateCollection, GeoKitError> {
    let element_dimension = dimension(element);

    if let Some(pos_list) = element.child("posList") {
        let dimension = dimension(pos_list).or(element_dimension);
        return Ok(parse_pos_list(&pos_list.text(), dimension).into());
    }

    let mut coordinates = vec![];
    for child in element.elements() {
        match child.name.as_str() {
            "pos" => {
                let dimension = dimension(child).or(element_dimension);
                coordinates.extend(parse_pos_list(&child.text(), dimension).into_iter().take(1));
            }
            "coordinates" => coordinates.extend(parse_coordinates(child)),
            "coord" => {
                match (child.child_f64("X"), child.child_f64("Y")) {
                    (Some(x), Some(y)) => coordinates.push(Coordinate::from_parts(y, x, child.child_f64("Z"))),
                    _ => warn!("Skipping malformed <coord> element"),
                }
            }
            _ => {}
        }
    }

    Ok(coordinates.into())
}

/// Parses a whitespace separated list of `lat lon [alt]` positions. Positions with malformed values are skipped.
pub(crate) fn parse_pos_list(text: &str, dimension: Option<usize>) -> Vec<Coordinate> {
    let values: Vec<&str> = text.split_whitespace().collect();
    let dimension = match dimension {
        Some(d @ 2..=3) => d,
        Some(d) => {
            warn!("Unsupported GML dimension {d}, reading first two values of every position");
            d.max(2)
        }
        None => 2,
    };

    let mut coordinates = Vec::with_capacity(values.len() / dimension);
    for chunk in values.chunks(dimension) {
        if chunk.len() < 2 {
            warn!("Skipping incomplete GML position {chunk:?}");
            continue;
        }

        let parsed: Option<Vec<f64>> = chunk.iter().map(|v| v.parse().ok()).collect();
        match parsed.as_deref() {
            Some([lat, lon]) => coordinates.push(Coordinate::new(*lat, *lon)),
            Some([lat, lon, alt, ..]) if dimension == 3 => {
                coordinates.push(Coordinate::with_altitude(*lat, *lon, *alt))
            }
            Some([lat, lon, ..]) => coordinates.push(Coordinate::new(*lat, *lon)),
            _ => warn!("Skipping malformed GML position {chunk:?}"),
        }
    }

    coordinates
}

fn parse_coordinates(element: &XmlElement) -> Vec<Coordinate> {
    let decimal = element.attr("decimal").unwrap_or(".");
    let cs = element.attr("cs").unwrap_or(",");
    let text = element.text();
    let tuples: Vec<&str> = match element.attr("ts") {
        Some(ts) if !ts.trim().is_empty() => text.split(ts).collect(),
        _ => text.split_whitespace().collect(),
    };

    let mut coordinates = vec![];
    for tuple in tuples.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        let parsed: Option<Vec<f64>> = tuple
            .split(cs)
            .map(|v| v.trim().replace(decimal, ".").parse().ok())
            .collect();
        match parsed.as_deref() {
            Some([lon, lat]) => coordinates.push(Coordinate::new(*lat, *lon)),
            Some([lon, lat, alt, ..]) => coordinates.push(Coordinate::with_altitude(*lat, *lon, *alt)),
            _ => warn!("Skipping malformed GML coordinates {tuple:?}"),
        }
    }

    coordinates
}

/// Writes the geometry as GML 3. If `declare_namespace` is set, the `gml` prefix is declared on the written
/// element.
pub fn write_geometry<W: Write>(
    writer: &mut XmlWriter<W>,
    geometry: &Geometry,
    declare_namespace: bool,
) -> Result<(), GeoKitError> {
    let is_3d = geometry.is_3d();
    let mut attributes = vec![];
    if declare_namespace {
        attributes.push(("xmlns:gml", GML_NAMESPACE));
    }
    if is_3d {
        attributes.push(("srsDimension", "3"));
    }

    match geometry {
        Geometry::Point(point) => {
            writer.start("gml:Point", &attributes)?;
            writer.text_element("gml:pos", &pos_list(std::slice::from_ref(&point.coordinate), is_3d))?;
            writer.end("gml:Point")
        }
        Geometry::LineString(line) => {
            writer.start("gml:LineString", &attributes)?;
            writer.text_element("gml:posList", &pos_list(&line.vertices, is_3d))?;
            writer.end("gml:LineString")
        }
        Geometry::Polygon(polygon) => write_polygon(writer, polygon, &attributes, is_3d),
        Geometry::MultiPoint(multi) => {
            writer.start("gml:MultiPoint", &attributes)?;
            for point in &multi.points {
                writer.start("gml:pointMember", &[])?;
                writer.start("gml:Point", &[])?;
                writer.text_element("gml:pos", &pos_list(std::slice::from_ref(&point.coordinate), is_3d))?;
                writer.end("gml:Point")?;
                writer.end("gml:pointMember")?;
            }
            writer.end("gml:MultiPoint")
        }
        Geometry::MultiLineString(multi) => {
            writer.start("gml:MultiCurve", &attributes)?;
            for line in &multi.line_strings {
                writer.start("gml:curveMember", &[])?;
                writer.start("gml:LineString", &[])?;
                writer.text_element("gml:posList", &pos_list(&line.vertices, is_3d))?;
                writer.end("gml:LineString")?;
                writer.end("gml:curveMember")?;
            }
            writer.end("gml:MultiCurve")
        }
        Geometry::MultiPolygon(multi) => {
            writer.start("gml:MultiSurface", &attributes)?;
            for polygon in &multi.polygons {
                writer.start("gml:surfaceMember", &[])?;
                write_polygon(writer, polygon, &[], is_3d)?;
                writer.end("gml:surfaceMember")?;
            }
            writer.end("gml:MultiSurface")
        }
        Geometry::GeometryCollection(collection) => {
            writer.start("gml:MultiGeometry", &attributes)?;
            for member in &collection.geometries {
                writer.start("gml:geometryMember", &[])?;
                write_geometry(writer, member, false)?;
                writer.end("gml:geometryMember")?;
            }
            writer.end("gml:MultiGeometry")
        }
        Geometry::BoundingBox(shape) => write_envelope(writer, &shape.bounds, &attributes),
    }
}

fn write_polygon<W: Write>(
    writer: &mut XmlWriter<W>,
    polygon: &Polygon,
    attributes: &[(&str, &str)],
    is_3d: bool,
) -> Result<(), GeoKitError> {
    writer.start("gml:Polygon", attributes)?;
    for (index, ring) in polygon.rings().enumerate() {
        let boundary = if index == 0 { "gml:exterior" } else { "gml:interior" };
        writer.start(boundary, &[])?;
        writer.start("gml:LinearRing", &[])?;
        writer.text_element("gml:posList", &pos_list(ring, is_3d))?;
        writer.end("gml:LinearRing")?;
        writer.end(boundary)?;
    }
    writer.end("gml:Polygon")
}

fn write_envelope<W: Write>(
    writer: &mut XmlWriter<W>,
    bounds: &BoundingBox,
    attributes: &[(&str, &str)],
) -> Result<(), GeoKitError> {
    let attributes: Vec<_> = attributes
        .iter()
        .copied()
        .filter(|(key, _)| *key != "srsDimension")
        .collect();
    writer.start("gml:Envelope", &attributes)?;
    writer.text_element(
        "gml:lowerCorner",
        &pos_list(&[Coordinate::new(bounds.south(), bounds.west())], false),
    )?;
    writer.text_element(
        "gml:upperCorner",
        &pos_list(&[Coordinate::new(bounds.north(), bounds.east())], false),
    )?;
    writer.end("gml:Envelope")
}

/// Formats positions as a `lat lon [alt]` list.
pub(crate) fn pos_list(coordinates: &[Coordinate], is_3d: bool) -> String {
    let mut values = Vec::with_capacity(coordinates.len() * 3);
    for coordinate in coordinates {
        values.push(format_number(coordinate.latitude()));
        values.push(format_number(coordinate.longitude()));
        if is_3d {
            values.push(format_number(coordinate.altitude().unwrap_or(0.0)));
        }
    }

    values.join(" ")
}
