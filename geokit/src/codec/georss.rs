//! GeoRSS reader and writer.
//!
//! The reader scans RSS `item` and Atom `entry` elements of a feed for GeoRSS Simple elements (`georss:point`,
//! `georss:line`, `georss:polygon`, `georss:box`, `georss:circle`), GeoRSS GML (`georss:where`) and W3C Basic Geo
//! (`geo:lat`/`geo:long`) locations. Simple elements use whitespace separated `lat lon` pairs.

use std::io::Write;

use geokit_types::{
    Attributed, BoundingBox, Coordinate, Geometry, GeometryCollection, LineString, Point, Polygon, PropertyValue,
    Shape, ShapeMetadata, ShapeStyle, SpatialDataSet, Styles,
};
use log::warn;

use crate::codec::gml::{self, parse_pos_list};
use crate::codec::{GeoRssWriteOptions, ReadOptions, SpatialReader, SpatialWriter, TextWriter, UriReader};
use crate::error::GeoKitError;
use crate::xml::{
    parse_document, XmlElement, XmlWriter, ATOM_NAMESPACE, GEORSS_NAMESPACE, GEO_NAMESPACE, GML_NAMESPACE,
};

/// Number of segments used to approximate `georss:circle`.
const CIRCLE_SEGMENTS: usize = 24;

/// Metadata property holding the link of a feed item.
pub const LINK_PROPERTY: &str = "link";

/// GeoRSS reader.
#[derive(Debug, Clone, Default)]
pub struct GeoRssReader {
    options: ReadOptions,
}

impl GeoRssReader {
    /// Creates a new reader.
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }

    fn read_items(&self, element: &XmlElement, dataset: &mut SpatialDataSet) -> Result<(), GeoKitError> {
        for child in element.elements() {
            if child.is("item") || child.is("entry") {
                dataset.geometries.extend(self.read_item(child, &mut dataset.styles)?);
            } else {
                self.read_items(child, dataset)?;
            }
        }

        Ok(())
    }

    fn read_item(&self, item: &XmlElement, styles: &mut Styles) -> Result<Option<Geometry>, GeoKitError> {
        let mut geometries = read_locations(item)?;
        let mut geometry = match geometries.len() {
            0 => {
                warn!("Skipping feed item without location");
                return Ok(None);
            }
            1 => geometries.remove(0),
            _ => GeometryCollection::new(geometries).into(),
        };

        let metadata = self.read_metadata(item);
        if metadata.has_metadata() || metadata.id.is_some() {
            *geometry.metadata_mut() = Some(metadata);
        }

        if let Some(icon) = item.child_string("icon", false) {
            let style = ShapeStyle {
                icon_url: Some(icon),
                ..Default::default()
            };
            geometry.set_style_key(Some(styles.insert_embedded(style)));
        }

        Ok(Some(geometry))
    }

    fn read_metadata(&self, element: &XmlElement) -> ShapeMetadata {
        let strip = self.options.strip_html;
        let mut metadata = ShapeMetadata::new();
        metadata.id = element
            .child_string("guid", false)
            .or_else(|| element.child_string("id", false));
        metadata.title = element.child_string("title", strip);
        metadata.description = element
            .child_string("description", strip)
            .or_else(|| element.child_string("summary", strip))
            .or_else(|| element.child_string("subtitle", strip))
            .or_else(|| element.child_string("content", strip));

        if let Some(link) = read_link(element) {
            metadata
                .properties
                .insert(LINK_PROPERTY.to_string(), PropertyValue::String(link));
        }

        let published = ["pubDate", "published", "updated"]
            .into_iter()
            .find_map(|name| element.child_datetime(name));
        if let Some(published) = published {
            metadata
                .properties
                .insert("published".to_string(), PropertyValue::DateTime(published));
        }

        metadata
    }
}

impl SpatialReader for GeoRssReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let root = parse_document(data)?;
        if !root.is("rss") && !root.is("feed") && !root.is("RDF") {
            return Err(GeoKitError::Format(format!(
                "expected RSS or Atom feed, found <{}>",
                root.name
            )));
        }

        let mut dataset = SpatialDataSet::new();
        self.read_items(&root, &mut dataset)?;

        let channel = root.child("channel").unwrap_or(&root);
        let metadata = self.read_metadata(channel);
        if metadata.has_metadata() {
            dataset.metadata = Some(metadata);
        }

        self.options.finish(&mut dataset);
        Ok(dataset)
    }
}

impl UriReader for GeoRssReader {}

fn read_link(element: &XmlElement) -> Option<String> {
    let mut links = element.children_named("link");
    let first = links.next()?;
    if first.attr("href").is_none() {
        return first.value(false);
    }

    std::iter::once(first)
        .chain(links)
        .find(|link| matches!(link.attr("rel"), None | Some("alternate")))
        .unwrap_or(first)
        .attr("href")
        .map(String::from)
}

fn read_locations(item: &XmlElement) -> Result<Vec<Geometry>, GeoKitError> {
    let mut geometries = vec![];
    let mut latitude = None;
    let mut longitude = None;

    for child in item.elements() {
        match child.namespace.as_deref() {
            Some(GEORSS_NAMESPACE) => {
                if let Some(geometry) = read_georss(child, item)? {
                    geometries.push(geometry);
                }
            }
            Some(GEO_NAMESPACE) => match child.name.as_str() {
                "lat" => latitude = child.value(false).and_then(|v| parse_value(&v)),
                "long" | "lon" => longitude = child.value(false).and_then(|v| parse_value(&v)),
                "Point" => {
                    let lat = child.child_f64("lat");
                    let lon = child.child_f64("long").or_else(|| child.child_f64("lon"));
                    if let (Some(lat), Some(lon)) = (lat, lon) {
                        geometries.push(Point::new(Coordinate::new(lat, lon)).into());
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    if let (Some(lat), Some(lon)) = (latitude, longitude) {
        geometries.push(Point::new(Coordinate::new(lat, lon)).into());
    }

    Ok(geometries)
}

fn parse_value(value: &str) -> Option<f64> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Skipping malformed coordinate value {value:?}");
            None
        }
    }
}

fn read_georss(element: &XmlElement, item: &XmlElement) -> Result<Option<Geometry>, GeoKitError> {
    let text = element.text();
    let geometry: Geometry = match element.name.as_str() {
        "point" => {
            let Some(mut coordinate) = parse_pos_list(&text, None).into_iter().next() else {
                warn!("Skipping malformed georss:point {text:?}");
                return Ok(None);
            };
            if let Some(elevation) = item.child_ns(GEORSS_NAMESPACE, "elev").and_then(|e| e.value(false)) {
                if let Some(elevation) = parse_value(&elevation) {
                    coordinate = Coordinate::with_altitude(coordinate.latitude(), coordinate.longitude(), elevation);
                }
            }
            Point::new(coordinate).into()
        }
        "line" => LineString::new(parse_pos_list(&text, None)).into(),
        "polygon" => Polygon::new(parse_pos_list(&text, None)).into(),
        "box" => match parse_pos_list(&text, None).as_slice() {
            [lower, upper] => BoundingBox::from_edges(
                upper.latitude(),
                lower.latitude(),
                upper.longitude(),
                lower.longitude(),
            )
            .into(),
            _ => {
                warn!("Skipping malformed georss:box {text:?}");
                return Ok(None);
            }
        },
        "circle" => {
            let values: Vec<f64> = text.split_whitespace().filter_map(parse_value).collect();
            let [lat, lon, radius] = values.as_slice() else {
                warn!("Skipping malformed georss:circle {text:?}");
                return Ok(None);
            };
            let ring = Coordinate::regular_polygon(&Coordinate::new(*lat, *lon), *radius, CIRCLE_SEGMENTS, 0.0);
            Polygon::new(ring).into()
        }
        "where" => {
            for child in element.elements() {
                if let Some(geometry) = gml::read_geometry(child)? {
                    return Ok(Some(geometry));
                }
            }
            warn!("Skipping georss:where without GML geometry");
            return Ok(None);
        }
        _ => return Ok(None),
    };

    Ok(Some(geometry))
}

/// GeoRSS writer producing an Atom feed.
///
/// Geometries that cannot be expressed with GeoRSS Simple elements (multi-geometries, collections, polygons with
/// holes and 3d shapes other than points) are written as GML inside `georss:where`.
#[derive(Debug, Clone, Default)]
pub struct GeoRssWriter {
    options: GeoRssWriteOptions,
}

impl GeoRssWriter {
    /// Creates a new writer.
    pub fn new(options: GeoRssWriteOptions) -> Self {
        Self { options }
    }

    fn write_entry<W: Write>(
        &self,
        writer: &mut XmlWriter<W>,
        geometry: &Geometry,
        data: &SpatialDataSet,
    ) -> Result<(), GeoKitError> {
        writer.start("entry", &[])?;

        let metadata = geometry.metadata().cloned().unwrap_or_default();
        writer.text_element("title", metadata.title.as_deref().unwrap_or_default())?;
        writer.optional_element("id", metadata.id.as_deref())?;
        if let Some(description) = metadata.description.as_deref() {
            writer.text_element_with("content", &[("type", "html")], description)?;
        }
        if let Some(link) = metadata.property(LINK_PROPERTY).and_then(PropertyValue::as_str) {
            writer.empty("link", &[("href", link)])?;
        }
        if let Some(icon) = data.style_of(geometry).and_then(|s| s.icon_url.as_deref()) {
            writer.text_element("icon", icon)?;
        }

        if self.options.use_gml || !is_simple(geometry) {
            writer.start("georss:where", &[])?;
            gml::write_geometry(writer, geometry, false)?;
            writer.end("georss:where")?;
        } else {
            self.write_simple(writer, geometry)?;
        }

        writer.end("entry")
    }

    fn write_simple<W: Write>(&self, writer: &mut XmlWriter<W>, geometry: &Geometry) -> Result<(), GeoKitError> {
        match geometry {
            Geometry::Point(point) => {
                writer.text_element("georss:point", &gml::pos_list(&[point.coordinate], false))?;
                if let Some(altitude) = point.coordinate.altitude() {
                    writer.text_element("georss:elev", &crate::codec::wkt::format_number(altitude))?;
                }
                Ok(())
            }
            Geometry::LineString(line) => writer.text_element("georss:line", &gml::pos_list(&line.vertices, false)),
            Geometry::Polygon(polygon) => {
                writer.text_element("georss:polygon", &gml::pos_list(&polygon.exterior_ring, false))
            }
            Geometry::BoundingBox(shape) => {
                let corners = [
                    Coordinate::new(shape.bounds.south(), shape.bounds.west()),
                    Coordinate::new(shape.bounds.north(), shape.bounds.east()),
                ];
                writer.text_element("georss:box", &gml::pos_list(&corners, false))
            }
            _ => Err(GeoKitError::unsupported_geometry(geometry.geometry_type(), "GeoRSS Simple")),
        }
    }
}

fn is_simple(geometry: &Geometry) -> bool {
    match geometry {
        Geometry::Point(_) | Geometry::BoundingBox(_) => true,
        Geometry::LineString(line) => !line.is_3d(),
        Geometry::Polygon(polygon) => polygon.interior_rings.is_empty() && !polygon.is_3d(),
        _ => false,
    }
}

impl SpatialWriter for GeoRssWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        let mut writer = XmlWriter::new(out);
        writer.declaration()?;
        writer.start(
            "feed",
            &[
                ("xmlns", ATOM_NAMESPACE),
                ("xmlns:georss", GEORSS_NAMESPACE),
                ("xmlns:gml", GML_NAMESPACE),
            ],
        )?;

        let metadata = data.metadata.clone().unwrap_or_default();
        writer.text_element("title", metadata.title.as_deref().unwrap_or_default())?;
        writer.optional_element("subtitle", metadata.description.as_deref())?;
        writer.optional_element("id", metadata.id.as_deref())?;
        writer.text_element("updated", &chrono::Utc::now().to_rfc3339())?;

        for geometry in &data.geometries {
            self.write_entry(&mut writer, geometry, data)?;
        }

        writer.end("feed")
    }
}

impl TextWriter for GeoRssWriter {}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use geokit_types::{latlon, GeometryType, MultiPoint};

    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
        <rss version="2.0" xmlns:georss="http://www.georss.org/georss"
             xmlns:geo="http://www.w3.org/2003/01/geo/wgs84_pos#" xmlns:gml="http://www.opengis.net/gml">
            <channel>
                <title>Earthquakes</title>
                <description>Recent <b>events</b></description>
                <item>
                    <title>M 5.1</title>
                    <link>http://example.com/1</link>
                    <guid>eq1</guid>
                    <georss:point>45.256 -71.92</georss:point>
                    <georss:elev>120</georss:elev>
                    <icon>http://example.com/quake.png</icon>
                </item>
                <item>
                    <title>Route</title>
                    <georss:line>45.256 -110.45 46.46 -109.48 43.84 -109.86</georss:line>
                </item>
                <item>
                    <title>Area</title>
                    <georss:where>
                        <gml:Polygon>
                            <gml:exterior><gml:LinearRing>
                                <gml:posList>45 -110 46 -109 43 -109 45 -110</gml:posList>
                            </gml:LinearRing></gml:exterior>
                        </gml:Polygon>
                    </georss:where>
                </item>
                <item>
                    <title>Basic geo</title>
                    <geo:lat>55.7</geo:lat>
                    <geo:long>37.6</geo:long>
                </item>
                <item>
                    <title>No location</title>
                </item>
            </channel>
        </rss>"#;

    #[test]
    fn rss_feed() {
        let dataset = GeoRssReader::new(ReadOptions::default().with_strip_html(true))
            .parse(RSS.as_bytes())
            .unwrap();
        assert_eq!(dataset.geometries.len(), 4);

        let point = &dataset.geometries[0];
        assert_matches!(point, Geometry::Point(p) if p.coordinate == latlon!(45.256, -71.92, 120.0));
        let metadata = point.metadata().unwrap();
        assert_eq!(metadata.id.as_deref(), Some("eq1"));
        assert_eq!(
            metadata.property(LINK_PROPERTY),
            Some(&PropertyValue::String("http://example.com/1".into()))
        );
        let style = dataset.style_of(point).unwrap();
        assert_eq!(style.icon_url.as_deref(), Some("http://example.com/quake.png"));
        assert_eq!(dataset.styles.key(point.style_key().unwrap()), Some("embeddedStyle_0"));

        assert_eq!(dataset.geometries[1].geometry_type(), GeometryType::LineString);
        assert_eq!(dataset.geometries[1].num_points(), 3);
        assert_eq!(dataset.geometries[2].geometry_type(), GeometryType::Polygon);
        assert_matches!(&dataset.geometries[3], Geometry::Point(p) if p.coordinate == latlon!(55.7, 37.6));

        let document = dataset.metadata.unwrap();
        assert_eq!(document.title.as_deref(), Some("Earthquakes"));
        assert_eq!(document.description.as_deref(), Some("Recent events"));
    }

    #[test]
    fn atom_feed() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:georss="http://www.georss.org/georss">
            <title>Atom</title>
            <entry>
                <title>Circle</title>
                <link rel="self" href="http://example.com/self"/>
                <link href="http://example.com/circle"/>
                <summary>Round area</summary>
                <georss:circle>10 20 1000</georss:circle>
            </entry>
            <entry>
                <title>Box</title>
                <georss:box>42.943 -71.032 43.039 -69.856</georss:box>
            </entry>
        </feed>"#;

        let dataset = GeoRssReader::default().parse(atom.as_bytes()).unwrap();
        assert_eq!(dataset.geometries.len(), 2);

        let Geometry::Polygon(circle) = &dataset.geometries[0] else {
            panic!("polygon expected");
        };
        assert_eq!(circle.exterior_ring.len(), 25);
        assert!(circle.exterior_ring.is_closed());
        assert_abs_diff_eq!(
            circle.exterior_ring[0].distance_to(&latlon!(10.0, 20.0)),
            1000.0,
            epsilon = 1.0
        );
        let metadata = circle.metadata.as_ref().unwrap();
        assert_eq!(metadata.description.as_deref(), Some("Round area"));
        assert_eq!(
            metadata.property(LINK_PROPERTY).and_then(PropertyValue::as_str),
            Some("http://example.com/circle")
        );

        let bounds = dataset.geometries[1].envelope().unwrap();
        assert_abs_diff_eq!(bounds.south(), 42.943);
        assert_abs_diff_eq!(bounds.east(), -69.856);
    }

    #[test]
    fn not_a_feed() {
        assert_matches!(
            GeoRssReader::default().parse(b"<kml/>"),
            Err(GeoKitError::Format(_))
        );
        assert!(GeoRssReader::default().read(b"plain text").is_error());
    }

    #[test]
    fn write_and_read_back() {
        let point = Point::new(latlon!(1.0, 2.0)).with_metadata(
            ShapeMetadata::new()
                .with_title("point")
                .with_description("<b>bold</b>")
                .with_property(LINK_PROPERTY, "http://example.com"),
        );
        let polygon = Polygon::with_holes(
            vec![latlon!(0.0, 0.0), latlon!(0.0, 10.0), latlon!(10.0, 10.0), latlon!(0.0, 0.0)],
            vec![vec![latlon!(1.0, 1.0), latlon!(2.0, 2.0), latlon!(1.0, 2.0), latlon!(1.0, 1.0)].into()],
        );
        let multi = MultiPoint::new(vec![Point::new(latlon!(3.0, 4.0)), Point::new(latlon!(5.0, 6.0))]);
        let dataset = SpatialDataSet::from_geometries(vec![point.into(), polygon.clone().into(), multi.into()]);

        let text = GeoRssWriter::default().write_string(&dataset).unwrap();
        assert!(text.contains("<georss:point>1 2</georss:point>"));
        assert!(text.contains("<georss:where>"));

        let back = GeoRssReader::default().parse(text.as_bytes()).unwrap();
        assert_eq!(back.geometries.len(), 3);
        let metadata = back.geometries[0].metadata().unwrap();
        assert_eq!(metadata.title.as_deref(), Some("point"));
        assert_eq!(metadata.description.as_deref(), Some("<b>bold</b>"));
        assert_eq!(
            metadata.property(LINK_PROPERTY).and_then(PropertyValue::as_str),
            Some("http://example.com")
        );
        assert_matches!(&back.geometries[1], Geometry::Polygon(p) if p.interior_rings == polygon.interior_rings);
        assert_eq!(back.geometries[2].geometry_type(), GeometryType::MultiPoint);
    }

    #[test]
    fn gml_option() {
        let dataset = SpatialDataSet::from_geometries(vec![Point::new(latlon!(1.0, 2.0)).into()]);
        let text = GeoRssWriter::new(GeoRssWriteOptions { use_gml: true })
            .write_string(&dataset)
            .unwrap();
        assert!(text.contains("<gml:pos>1 2</gml:pos>"));
        assert!(!text.contains("georss:point"));
    }
}
