use std::io::Write;

use geokit_types::{Attributed, Geometry, Polygon, ShapeMetadata, ShapeStyle, SpatialDataSet};

use super::format_coordinates;
use crate::codec::wkt::format_number;
use crate::codec::{SpatialWriter, TextWriter};
use crate::error::GeoKitError;
use crate::xml::{XmlWriter, KML_NAMESPACE};

/// KML 2.2 writer.
///
/// All styles of the dataset are written as shared `Style` elements of the document, geometries reference them
/// by their keys. Multi-geometries and collections are written as `MultiGeometry`, bounding boxes as polygons.
#[derive(Debug, Clone, Default)]
pub struct KmlWriter;

impl SpatialWriter for KmlWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        let mut writer = XmlWriter::new(out);
        writer.declaration()?;
        writer.start("kml", &[("xmlns", KML_NAMESPACE)])?;
        writer.start("Document", &[])?;

        if let Some(metadata) = &data.metadata {
            writer.optional_element("name", metadata.title.as_deref())?;
            if let Some(description) = &metadata.description {
                writer.cdata_element("description", description)?;
            }
        }

        for (_, key, style) in data.styles.iter() {
            write_style(&mut writer, key, style)?;
        }

        for geometry in &data.geometries {
            write_placemark(&mut writer, geometry, data)?;
        }

        writer.end("Document")?;
        writer.end("kml")
    }
}

impl TextWriter for KmlWriter {}

fn write_style<W: Write>(writer: &mut XmlWriter<W>, key: &str, style: &ShapeStyle) -> Result<(), GeoKitError> {
    writer.start("Style", &[("id", key)])?;

    if style.icon_url.is_some() || style.icon_scale.is_some() || style.icon_color.is_some() {
        writer.start("IconStyle", &[])?;
        if let Some(color) = style.icon_color {
            writer.text_element("color", &color.to_kml_hex())?;
        }
        if let Some(scale) = style.icon_scale {
            writer.text_element("scale", &format_number(scale))?;
        }
        if let Some(heading) = style.icon_heading {
            writer.text_element("heading", &format_number(heading))?;
        }
        if let Some(url) = &style.icon_url {
            writer.start("Icon", &[])?;
            writer.text_element("href", url)?;
            writer.end("Icon")?;
        }
        writer.end("IconStyle")?;
    }

    if style.stroke_color.is_some() || style.stroke_thickness.is_some() {
        writer.start("LineStyle", &[])?;
        if let Some(color) = style.stroke_color {
            writer.text_element("color", &color.to_kml_hex())?;
        }
        if let Some(width) = style.stroke_thickness {
            writer.text_element("width", &format_number(width))?;
        }
        writer.end("LineStyle")?;
    }

    if style.fill_color.is_some() || style.fill_polygon.is_some() || style.outline_polygon.is_some() {
        writer.start("PolyStyle", &[])?;
        if let Some(color) = style.fill_color {
            writer.text_element("color", &color.to_kml_hex())?;
        }
        if let Some(fill) = style.fill_polygon {
            writer.text_element("fill", if fill { "1" } else { "0" })?;
        }
        if let Some(outline) = style.outline_polygon {
            writer.text_element("outline", if outline { "1" } else { "0" })?;
        }
        writer.end("PolyStyle")?;
    }

    writer.end("Style")
}

fn write_placemark<W: Write>(
    writer: &mut XmlWriter<W>,
    geometry: &Geometry,
    data: &SpatialDataSet,
) -> Result<(), GeoKitError> {
    let metadata = geometry.metadata();
    match metadata.and_then(|m| m.id.as_deref()) {
        Some(id) => writer.start("Placemark", &[("id", id)])?,
        None => writer.start("Placemark", &[])?,
    }

    if let Some(metadata) = metadata {
        writer.optional_element("name", metadata.title.as_deref())?;
        if let Some(description) = &metadata.description {
            writer.cdata_element("description", description)?;
        }
    }

    if let Some(key) = geometry.style_key().and_then(|id| data.styles.key(id)) {
        writer.text_element("styleUrl", &format!("#{key}"))?;
    }

    if let Some(metadata) = metadata {
        write_extended_data(writer, metadata)?;
    }

    write_geometry(writer, geometry)?;
    writer.end("Placemark")
}

fn write_extended_data<W: Write>(writer: &mut XmlWriter<W>, metadata: &ShapeMetadata) -> Result<(), GeoKitError> {
    if metadata.properties.is_empty() {
        return Ok(());
    }

    writer.start("ExtendedData", &[])?;
    for (name, value) in &metadata.properties {
        writer.start("Data", &[("name", name.as_str())])?;
        writer.text_element("value", &value.to_string())?;
        writer.end("Data")?;
    }
    writer.end("ExtendedData")
}

fn write_geometry<W: Write>(writer: &mut XmlWriter<W>, geometry: &Geometry) -> Result<(), GeoKitError> {
    match geometry {
        Geometry::Point(point) => {
            writer.start("Point", &[])?;
            writer.text_element("coordinates", &format_coordinates(&[point.coordinate]))?;
            writer.end("Point")
        }
        Geometry::LineString(line) => {
            writer.start("LineString", &[])?;
            writer.text_element("coordinates", &format_coordinates(&line.vertices))?;
            writer.end("LineString")
        }
        Geometry::Polygon(polygon) => write_polygon(writer, polygon),
        Geometry::MultiPoint(multi) => {
            writer.start("MultiGeometry", &[])?;
            for point in &multi.points {
                writer.start("Point", &[])?;
                writer.text_element("coordinates", &format_coordinates(&[point.coordinate]))?;
                writer.end("Point")?;
            }
            writer.end("MultiGeometry")
        }
        Geometry::MultiLineString(multi) => {
            writer.start("MultiGeometry", &[])?;
            for line in &multi.line_strings {
                writer.start("LineString", &[])?;
                writer.text_element("coordinates", &format_coordinates(&line.vertices))?;
                writer.end("LineString")?;
            }
            writer.end("MultiGeometry")
        }
        Geometry::MultiPolygon(multi) => {
            writer.start("MultiGeometry", &[])?;
            for polygon in &multi.polygons {
                write_polygon(writer, polygon)?;
            }
            writer.end("MultiGeometry")
        }
        Geometry::GeometryCollection(collection) => {
            writer.start("MultiGeometry", &[])?;
            for member in &collection.geometries {
                write_geometry(writer, member)?;
            }
            writer.end("MultiGeometry")
        }
        Geometry::BoundingBox(shape) => write_polygon(writer, &shape.bounds.to_polygon()),
    }
}

fn write_polygon<W: Write>(writer: &mut XmlWriter<W>, polygon: &Polygon) -> Result<(), GeoKitError> {
    writer.start("Polygon", &[])?;
    for (index, ring) in polygon.rings().enumerate() {
        let boundary = if index == 0 {
            "outerBoundaryIs"
        } else {
            "innerBoundaryIs"
        };
        writer.start(boundary, &[])?;
        writer.start("LinearRing", &[])?;
        writer.text_element("coordinates", &format_coordinates(ring))?;
        writer.end("LinearRing")?;
        writer.end(boundary)?;
    }
    writer.end("Polygon")
}
