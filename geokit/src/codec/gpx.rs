//! GPX 1.1 reader and writer.
//!
//! Waypoints become points, routes become line strings (optionally with their points) and tracks become
//! multi line strings with one line per segment. Garmin `gpxx` extensions are read into metadata properties, and
//! the display color of routes and tracks into a style.

use std::io::Write;

use geokit_types::{
    Attributed, BoundingBox, Coordinate, Geometry, LineString, MultiLineString, Point, PropertyValue, Shape,
    ShapeMetadata, ShapeStyle, SpatialDataSet, StyleColor, Styles,
};
use log::warn;

use crate::codec::wkt::format_number;
use crate::codec::{GpxReadOptions, SpatialReader, SpatialWriter, TextWriter, UriReader};
use crate::error::GeoKitError;
use crate::xml::{parse_document, XmlElement, XmlWriter, GPXX_NAMESPACE, GPX_NAMESPACE};

/// Metadata property telling whether a line string was read from a track (`"track"`) or a route (`"route"`).
pub const GPX_TYPE_PROPERTY: &str = "gpxType";

const TRACK_TYPE: &str = "track";
const ROUTE_TYPE: &str = "route";

/// Elements of waypoints and documents stored as metadata properties.
const WAYPOINT_PROPERTIES: &[&str] = &["cmt", "src", "sym", "type", "fix", "sat", "hdop", "vdop", "pdop"];

/// Garmin display colors.
const DISPLAY_COLORS: &[(&str, StyleColor)] = &[
    ("Black", StyleColor::rgba(0, 0, 0, 255)),
    ("DarkRed", StyleColor::rgba(139, 0, 0, 255)),
    ("DarkGreen", StyleColor::rgba(0, 100, 0, 255)),
    ("DarkYellow", StyleColor::rgba(184, 134, 11, 255)),
    ("DarkBlue", StyleColor::rgba(0, 0, 139, 255)),
    ("DarkMagenta", StyleColor::rgba(139, 0, 139, 255)),
    ("DarkCyan", StyleColor::rgba(0, 139, 139, 255)),
    ("LightGray", StyleColor::rgba(211, 211, 211, 255)),
    ("DarkGray", StyleColor::rgba(169, 169, 169, 255)),
    ("Red", StyleColor::rgba(255, 0, 0, 255)),
    ("Green", StyleColor::rgba(0, 255, 0, 255)),
    ("Yellow", StyleColor::rgba(255, 255, 0, 255)),
    ("Blue", StyleColor::rgba(0, 0, 255, 255)),
    ("Magenta", StyleColor::rgba(255, 0, 255, 255)),
    ("Cyan", StyleColor::rgba(0, 255, 255, 255)),
    ("White", StyleColor::rgba(255, 255, 255, 255)),
    ("Transparent", StyleColor::rgba(0, 0, 0, 0)),
];

fn display_color(name: &str) -> Option<StyleColor> {
    DISPLAY_COLORS
        .iter()
        .find(|(color_name, _)| color_name.eq_ignore_ascii_case(name.trim()))
        .map(|(_, color)| *color)
}

fn display_color_name(color: StyleColor) -> Option<&'static str> {
    DISPLAY_COLORS
        .iter()
        .find(|(_, value)| *value == color)
        .map(|(name, _)| *name)
}

/// GPX reader.
#[derive(Debug, Clone, Default)]
pub struct GpxReader {
    options: GpxReadOptions,
}

impl GpxReader {
    /// Creates a new reader.
    pub fn new(options: GpxReadOptions) -> Self {
        Self { options }
    }

    fn strip(&self) -> bool {
        self.options.base.strip_html
    }

    fn read_metadata(&self, element: &XmlElement) -> ShapeMetadata {
        let mut metadata = ShapeMetadata::new();
        metadata.title = element.child_string("name", self.strip());
        metadata.description = element.child_string("desc", self.strip());

        for name in WAYPOINT_PROPERTIES {
            if let Some(value) = element.child_string(name, false) {
                metadata.properties.insert(name.to_string(), value.into());
            }
        }

        if let Some(time) = element.child_datetime("time") {
            metadata.properties.insert("time".into(), time.into());
        }
        if let Some(link) = element.child("link").and_then(|link| link.attr("href")) {
            metadata.properties.insert("link".into(), link.into());
        }
        if let Some(number) = element.child_i64("number") {
            metadata.properties.insert("number".into(), number.into());
        }

        metadata
    }

    fn read_position(&self, element: &XmlElement) -> Option<Coordinate> {
        let (Some(lat), Some(lon)) = (element.attr_f64("lat"), element.attr_f64("lon")) else {
            warn!("Skipping <{}> without valid coordinates", element.name);
            return None;
        };

        Some(Coordinate::from_parts(lat, lon, element.child_f64("ele")))
    }

    fn read_waypoint(&self, element: &XmlElement, styles: &mut Styles) -> Option<Geometry> {
        let coordinate = self.read_position(element)?;
        let mut point = Point::new(coordinate);
        let mut metadata = self.read_metadata(element);
        read_extensions(element, &mut metadata, styles, &mut point);
        if metadata.has_metadata() {
            point.metadata = Some(metadata);
        }

        Some(point.into())
    }

    /// Reads a route either as one line or, with `read_route_waypoints` set, as its separate route points.
    fn read_route(&self, element: &XmlElement, dataset: &mut SpatialDataSet) {
        if self.options.read_route_waypoints {
            for point in element.children_named("rtept") {
                dataset.geometries.extend(self.read_waypoint(point, &mut dataset.styles));
            }
            return;
        }

        let vertices: Vec<Coordinate> = element
            .children_named("rtept")
            .filter_map(|p| self.read_position(p))
            .collect();

        let mut line = LineString::new(vertices);
        let mut metadata = self.read_metadata(element);
        metadata.properties.insert(GPX_TYPE_PROPERTY.into(), ROUTE_TYPE.into());
        read_extensions(element, &mut metadata, &mut dataset.styles, &mut line);
        line.metadata = Some(metadata);
        dataset.geometries.push(line.into());
    }

    fn read_track(&self, element: &XmlElement, styles: &mut Styles) -> Geometry {
        let segments = element
            .children_named("trkseg")
            .map(|segment| {
                let vertices: Vec<Coordinate> = segment
                    .children_named("trkpt")
                    .filter_map(|p| self.read_position(p))
                    .collect();
                LineString::new(vertices)
            })
            .collect();

        let mut track = MultiLineString::new(segments);
        let mut metadata = self.read_metadata(element);
        metadata.properties.insert(GPX_TYPE_PROPERTY.into(), TRACK_TYPE.into());
        read_extensions(element, &mut metadata, styles, &mut track);
        track.metadata = Some(metadata);

        track.into()
    }
}

/// Reads Garmin extensions of the element. Leaf values become properties, the display color becomes a style of
/// the geometry.
fn read_extensions(
    element: &XmlElement,
    metadata: &mut ShapeMetadata,
    styles: &mut Styles,
    target: &mut impl Attributed,
) {
    let Some(extensions) = element.child("extensions") else {
        return;
    };

    for extension in extensions.elements() {
        if extension.namespace.as_deref() != Some(GPXX_NAMESPACE) {
            continue;
        }

        for value in extension.elements() {
            if value.elements().next().is_some() {
                continue;
            }

            let Some(text) = value.value(false) else {
                continue;
            };

            if value.is("DisplayColor") {
                match display_color(&text) {
                    Some(color) => {
                        let style = ShapeStyle {
                            stroke_color: Some(color),
                            icon_color: Some(color),
                            ..Default::default()
                        };
                        target.set_style_key(Some(styles.insert_embedded(style)));
                    }
                    None => warn!("Unknown display color {text:?}"),
                }
            }

            metadata
                .properties
                .insert(value.name.clone(), PropertyValue::String(text));
        }
    }
}

impl SpatialReader for GpxReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let root = parse_document(data)?;
        if !root.is("gpx") {
            return Err(GeoKitError::Format(format!(
                "expected <gpx> root element, found <{}>",
                root.name
            )));
        }

        let mut dataset = SpatialDataSet::new();

        // GPX 1.0 keeps the document fields directly in the root.
        let header = root.child("metadata").unwrap_or(&root);
        let mut metadata = self.read_metadata(header);
        if let Some(author) = header.child("author") {
            let name = author.child_string("name", false).or_else(|| author.value(false));
            if let Some(name) = name {
                metadata.properties.insert("author".into(), name.into());
            }
        }
        if metadata.has_metadata() {
            dataset.metadata = Some(metadata);
        }

        if let Some(bounds) = header.child("bounds") {
            dataset.bounding_box = read_bounds(bounds);
        }

        for child in root.elements() {
            match child.name.as_str() {
                "wpt" => dataset
                    .geometries
                    .extend(self.read_waypoint(child, &mut dataset.styles)),
                "rte" => self.read_route(child, &mut dataset),
                "trk" => {
                    let track = self.read_track(child, &mut dataset.styles);
                    dataset.geometries.push(track);
                }
                _ => {}
            }
        }

        self.options.base.finish(&mut dataset);
        Ok(dataset)
    }
}

impl UriReader for GpxReader {}

/// Reads the `bounds` element. Latitudes are sorted since some producers swap them.
fn read_bounds(bounds: &XmlElement) -> Option<BoundingBox> {
    let (Some(lat1), Some(lat2), Some(west), Some(east)) = (
        bounds.attr_f64("minlat"),
        bounds.attr_f64("maxlat"),
        bounds.attr_f64("minlon"),
        bounds.attr_f64("maxlon"),
    ) else {
        warn!("Ignoring incomplete GPX bounds");
        return None;
    };

    Some(BoundingBox::from_edges(lat1.max(lat2), lat1.min(lat2), east, west))
}

/// GPX 1.1 writer.
///
/// Points become waypoints, line strings routes (or tracks if their [`GPX_TYPE_PROPERTY`] is `"track"`) and
/// multi line strings tracks. Multi points and collections are written member by member. Polygons and bounding
/// boxes cannot be represented in GPX and produce an error.
#[derive(Debug, Clone, Default)]
pub struct GpxWriter;

#[derive(Default)]
struct GpxContent<'a> {
    waypoints: Vec<&'a Point>,
    routes: Vec<&'a LineString>,
    tracks: Vec<(Option<&'a ShapeMetadata>, Option<StyleColor>, Vec<&'a LineString>)>,
}

impl<'a> GpxContent<'a> {
    fn collect(&mut self, geometry: &'a Geometry, data: &SpatialDataSet) -> Result<(), GeoKitError> {
        let color = data.style_of(geometry).and_then(|style| style.stroke_color);
        match geometry {
            Geometry::Point(point) => self.waypoints.push(point),
            Geometry::MultiPoint(multi) => self.waypoints.extend(multi.points.iter()),
            Geometry::LineString(line) => {
                let is_track = line
                    .metadata
                    .as_ref()
                    .and_then(|m| m.property(GPX_TYPE_PROPERTY))
                    .and_then(PropertyValue::as_str)
                    == Some(TRACK_TYPE);
                if is_track {
                    self.tracks.push((line.metadata.as_ref(), color, vec![line]));
                } else {
                    self.routes.push(line);
                }
            }
            Geometry::MultiLineString(multi) => {
                self.tracks
                    .push((multi.metadata.as_ref(), color, multi.line_strings.iter().collect()));
            }
            Geometry::GeometryCollection(collection) => {
                for member in &collection.geometries {
                    self.collect(member, data)?;
                }
            }
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::BoundingBox(_) => {
                return Err(GeoKitError::unsupported_geometry(geometry.geometry_type(), "GPX"));
            }
        }

        Ok(())
    }
}

impl SpatialWriter for GpxWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        let mut content = GpxContent::default();
        for geometry in &data.geometries {
            content.collect(geometry, data)?;
        }

        let mut writer = XmlWriter::new(out);
        writer.declaration()?;
        writer.start(
            "gpx",
            &[
                ("version", "1.1"),
                ("creator", "geokit"),
                ("xmlns", GPX_NAMESPACE),
                ("xmlns:gpxx", GPXX_NAMESPACE),
            ],
        )?;

        let bounds = data.bounding_box.or_else(|| {
            BoundingBox::join_all(data.geometries.iter().filter_map(|g| g.envelope()))
        });
        if data.metadata.is_some() || bounds.is_some() {
            writer.start("metadata", &[])?;
            if let Some(metadata) = &data.metadata {
                writer.optional_element("name", metadata.title.as_deref())?;
                writer.optional_element("desc", metadata.description.as_deref())?;
                if let Some(author) = metadata.property("author") {
                    writer.start("author", &[])?;
                    writer.text_element("name", &author.to_string())?;
                    writer.end("author")?;
                }
                if let Some(time) = metadata.property("time") {
                    writer.text_element("time", &time.to_string())?;
                }
            }
            if let Some(bounds) = bounds {
                let (min_lat, min_lon) = (format_number(bounds.south()), format_number(bounds.west()));
                let (max_lat, max_lon) = (format_number(bounds.north()), format_number(bounds.east()));
                writer.empty(
                    "bounds",
                    &[
                        ("minlat", &min_lat),
                        ("minlon", &min_lon),
                        ("maxlat", &max_lat),
                        ("maxlon", &max_lon),
                    ],
                )?;
            }
            writer.end("metadata")?;
        }

        for point in &content.waypoints {
            write_point(&mut writer, "wpt", &point.coordinate, point.metadata.as_ref())?;
        }

        for route in &content.routes {
            writer.start("rte", &[])?;
            write_header(&mut writer, route.metadata.as_ref())?;
            let color = data.style_of(*route).and_then(|style| style.stroke_color);
            write_color_extension(&mut writer, "gpxx:RouteExtension", color)?;
            for vertex in route.vertices.iter() {
                write_point(&mut writer, "rtept", vertex, None)?;
            }
            writer.end("rte")?;
        }

        for (metadata, color, segments) in &content.tracks {
            writer.start("trk", &[])?;
            write_header(&mut writer, *metadata)?;
            write_color_extension(&mut writer, "gpxx:TrackExtension", *color)?;
            for segment in segments {
                writer.start("trkseg", &[])?;
                for vertex in segment.vertices.iter() {
                    write_point(&mut writer, "trkpt", vertex, None)?;
                }
                writer.end("trkseg")?;
            }
            writer.end("trk")?;
        }

        writer.end("gpx")
    }
}

impl TextWriter for GpxWriter {}

fn write_header<W: Write>(writer: &mut XmlWriter<W>, metadata: Option<&ShapeMetadata>) -> Result<(), GeoKitError> {
    let Some(metadata) = metadata else {
        return Ok(());
    };

    writer.optional_element("name", metadata.title.as_deref())?;
    for name in ["cmt"] {
        if let Some(value) = metadata.property(name) {
            writer.text_element(name, &value.to_string())?;
        }
    }
    writer.optional_element("desc", metadata.description.as_deref())?;
    for name in ["src", "number", "type"] {
        if let Some(value) = metadata.property(name) {
            writer.text_element(name, &value.to_string())?;
        }
    }

    Ok(())
}

fn write_color_extension<W: Write>(
    writer: &mut XmlWriter<W>,
    extension: &str,
    color: Option<StyleColor>,
) -> Result<(), GeoKitError> {
    let Some(name) = color.and_then(display_color_name) else {
        return Ok(());
    };

    writer.start("extensions", &[])?;
    writer.start(extension, &[])?;
    writer.text_element("gpxx:DisplayColor", name)?;
    writer.end(extension)?;
    writer.end("extensions")
}

fn write_point<W: Write>(
    writer: &mut XmlWriter<W>,
    name: &str,
    coordinate: &Coordinate,
    metadata: Option<&ShapeMetadata>,
) -> Result<(), GeoKitError> {
    let lat = format_number(coordinate.latitude());
    let lon = format_number(coordinate.longitude());
    writer.start(name, &[("lat", &lat), ("lon", &lon)])?;

    if let Some(altitude) = coordinate.altitude() {
        writer.text_element("ele", &format_number(altitude))?;
    }

    if let Some(metadata) = metadata {
        if let Some(time) = metadata.property("time") {
            writer.text_element("time", &time.to_string())?;
        }
        writer.optional_element("name", metadata.title.as_deref())?;
        if let Some(value) = metadata.property("cmt") {
            writer.text_element("cmt", &value.to_string())?;
        }
        writer.optional_element("desc", metadata.description.as_deref())?;
        for property in ["src", "sym", "type", "fix", "sat", "hdop", "vdop", "pdop"] {
            if let Some(value) = metadata.property(property) {
                writer.text_element(property, &value.to_string())?;
            }
        }
    }

    writer.end(name)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use geokit_types::{latlon, GeometryType, Polygon};

    use super::*;
    use crate::codec::ReadOptions;

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"
             xmlns:gpxx="http://www.garmin.com/xmlschemas/GpxExtensions/v3">
            <metadata>
                <name>Weekend</name>
                <desc>Hiking trip</desc>
                <author><name>Alice</name></author>
                <bounds minlat="47.0" minlon="8.0" maxlat="46.0" maxlon="9.0"/>
            </metadata>
            <wpt lat="46.5" lon="8.5">
                <ele>1200.5</ele>
                <time>2024-06-01T10:00:00Z</time>
                <name>Hut</name>
                <cmt>Open in summer</cmt>
                <sym>Lodge</sym>
            </wpt>
            <wpt lat="bad" lon="8.5"><name>Broken</name></wpt>
            <rte>
                <name>Approach</name>
                <extensions>
                    <gpxx:RouteExtension>
                        <gpxx:IsAutoNamed>false</gpxx:IsAutoNamed>
                        <gpxx:DisplayColor>Magenta</gpxx:DisplayColor>
                    </gpxx:RouteExtension>
                </extensions>
                <rtept lat="46.1" lon="8.1"><name>Start</name></rtept>
                <rtept lat="46.2" lon="8.2"><name>Bridge</name></rtept>
            </rte>
            <trk>
                <name>Recorded</name>
                <trkseg>
                    <trkpt lat="46.1" lon="8.1"><ele>800</ele></trkpt>
                    <trkpt lat="46.2" lon="8.2"><ele>900</ele></trkpt>
                </trkseg>
                <trkseg>
                    <trkpt lat="46.3" lon="8.3"/>
                    <trkpt lat="46.4" lon="8.4"/>
                </trkseg>
            </trk>
        </gpx>"#;

    #[test]
    fn document() {
        let dataset = GpxReader::default().parse(GPX.as_bytes()).unwrap();
        assert_eq!(dataset.geometries.len(), 3);

        let metadata = dataset.metadata.as_ref().unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Weekend"));
        assert_eq!(metadata.property("author").and_then(|a| a.as_str()), Some("Alice"));

        let bounds = dataset.bounding_box.unwrap();
        assert_abs_diff_eq!(bounds.north(), 47.0);
        assert_abs_diff_eq!(bounds.south(), 46.0);
        assert_abs_diff_eq!(bounds.west(), 8.0);

        let hut = &dataset.geometries[0];
        assert_matches!(hut, Geometry::Point(p) if p.coordinate == latlon!(46.5, 8.5, 1200.5));
        let hut = hut.metadata().unwrap();
        assert_eq!(hut.title.as_deref(), Some("Hut"));
        assert_eq!(hut.property("sym").and_then(|s| s.as_str()), Some("Lodge"));
        assert!(hut.property("time").and_then(|t| t.as_datetime()).is_some());

        let route = &dataset.geometries[1];
        assert_eq!(route.geometry_type(), GeometryType::LineString);
        assert_eq!(route.num_points(), 2);
        let route_metadata = route.metadata().unwrap();
        assert_eq!(
            route_metadata.property("IsAutoNamed").and_then(|v| v.as_str()),
            Some("false")
        );
        assert_eq!(
            dataset.style_of(route).unwrap().stroke_color,
            Some(StyleColor::rgba(255, 0, 255, 255))
        );

        let track = &dataset.geometries[2];
        assert_matches!(track, Geometry::MultiLineString(m) if m.line_strings.len() == 2);
        assert_eq!(
            track.metadata().unwrap().property(GPX_TYPE_PROPERTY).and_then(|v| v.as_str()),
            Some(TRACK_TYPE)
        );
    }

    #[test]
    fn route_waypoints() {
        let types = |read_route_waypoints: bool| {
            let options = GpxReadOptions::from(ReadOptions::default()).with_route_waypoints(read_route_waypoints);
            let dataset = GpxReader::new(options).parse(GPX.as_bytes()).unwrap();
            dataset.geometries.iter().map(|g| g.geometry_type()).collect::<Vec<_>>()
        };

        assert_eq!(
            types(false),
            [GeometryType::Point, GeometryType::LineString, GeometryType::MultiLineString]
        );
        assert_eq!(
            types(true),
            [
                GeometryType::Point,
                GeometryType::Point,
                GeometryType::Point,
                GeometryType::MultiLineString
            ]
        );

        let reader = GpxReader::new(GpxReadOptions::from(ReadOptions::default()).with_route_waypoints(true));
        let dataset = reader.parse(GPX.as_bytes()).unwrap();
        assert_eq!(dataset.geometries[1].title(), Some("Start"));
        assert_eq!(dataset.geometries[2].title(), Some("Bridge"));
    }

    #[test]
    fn not_gpx() {
        assert_matches!(GpxReader::default().parse(b"<kml/>"), Err(GeoKitError::Format(_)));
    }

    #[test]
    fn write_and_read_back() {
        let dataset = GpxReader::default().parse(GPX.as_bytes()).unwrap();
        let text = GpxWriter.write_string(&dataset).unwrap();
        assert!(text.contains("<gpxx:DisplayColor>Magenta</gpxx:DisplayColor>"));

        let back = GpxReader::default().parse(text.as_bytes()).unwrap();
        assert_eq!(back.geometries.len(), 3);
        assert_eq!(back.geometries[0], dataset.geometries[0]);
        assert_eq!(back.geometries[1].geometry_type(), GeometryType::LineString);
        assert_eq!(back.geometries[2].geometry_type(), GeometryType::MultiLineString);
        assert_eq!(back.metadata.as_ref().unwrap().title.as_deref(), Some("Weekend"));
        assert_eq!(
            back.style_of(&back.geometries[1]).unwrap().stroke_color,
            Some(StyleColor::rgba(255, 0, 255, 255))
        );
    }

    #[test]
    fn polygons_are_not_supported() {
        let dataset = SpatialDataSet::from_geometries(vec![Polygon::new(vec![
            latlon!(0.0, 0.0),
            latlon!(0.0, 1.0),
            latlon!(1.0, 1.0),
            latlon!(0.0, 0.0),
        ])
        .into()]);
        assert_matches!(GpxWriter.write_string(&dataset), Err(GeoKitError::UnsupportedKind(_)));
    }
}
