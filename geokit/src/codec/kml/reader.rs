use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use geokit_types::{
    Attributed, Coordinate, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon, PropertyValue, ShapeMetadata, ShapeStyle, SpatialDataSet, StyleId, Styles,
};
use log::{debug, warn};

use super::{is_kmz, parse_coordinates, unpack};
use crate::codec::{KmlReadOptions, SpatialReader, UriReader};
use crate::error::GeoKitError;
use crate::fetch::{resolve_uri, Fetcher};
use crate::xml::{parse_document, XmlElement};

/// Maximum nesting of `NetworkLink` documents followed by [`KmlReader::parse_uri`]. Links found deeper are
/// ignored.
pub const MAX_NETWORK_LINK_DEPTH: usize = 3;

/// KML reader. Zipped documents (KMZ) are accepted too.
///
/// `NetworkLink` elements are only followed when the document is read by URI.
#[derive(Debug, Clone, Default)]
pub struct KmlReader {
    options: KmlReadOptions,
}

/// Parsed document with the not yet resolved network links.
struct KmlDocument {
    dataset: SpatialDataSet,
    links: Vec<String>,
}

/// State of a single document parse.
struct DocumentParser<'a> {
    options: &'a KmlReadOptions,
    dataset: SpatialDataSet,
    links: Vec<String>,
}

impl KmlReader {
    /// Creates a new reader.
    pub fn new(options: KmlReadOptions) -> Self {
        Self { options }
    }

    fn parse_document(&self, data: &[u8]) -> Result<KmlDocument, GeoKitError> {
        let data = unpack(data)?;
        let root = parse_document(&data)?;
        if !root.is("kml") {
            return Err(GeoKitError::Format(format!(
                "expected <kml> root element, found <{}>",
                root.name
            )));
        }

        let mut parser = DocumentParser {
            options: &self.options,
            dataset: SpatialDataSet::new(),
            links: vec![],
        };

        parser.collect_styles(&root);
        parser.collect_style_maps(&root);

        if let Some(document) = root.child("Document") {
            let metadata = parser.read_metadata(document);
            if metadata.has_metadata() {
                parser.dataset.metadata = Some(metadata);
            }
        }

        parser.read_container(&root)?;

        let DocumentParser {
            mut dataset, links, ..
        } = parser;
        self.options.base.finish(&mut dataset);

        Ok(KmlDocument { dataset, links })
    }
}

impl SpatialReader for KmlReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let document = self.parse_document(data)?;
        if !document.links.is_empty() {
            debug!(
                "Document has {} network links, they are only resolved when reading by URI",
                document.links.len()
            );
        }

        Ok(document.dataset)
    }
}

#[async_trait]
impl UriReader for KmlReader {
    async fn parse_uri(&self, uri: &str, fetcher: &dyn Fetcher) -> Result<SpatialDataSet, GeoKitError> {
        let data = fetcher.fetch_bytes(uri).await?;
        let KmlDocument { mut dataset, links } = self.parse_document(&data)?;
        if !self.options.resolve_network_links {
            return Ok(dataset);
        }

        let mut visited = HashSet::from([uri.to_string()]);
        let mut pending: VecDeque<(String, usize)> = links
            .into_iter()
            .map(|link| (resolve_uri(Some(uri), &link), 1))
            .collect();

        while let Some((link, depth)) = pending.pop_front() {
            if depth > MAX_NETWORK_LINK_DEPTH {
                warn!("Network link {link} is nested deeper than {MAX_NETWORK_LINK_DEPTH} levels, skipping it");
                continue;
            }

            if !visited.insert(link.clone()) {
                debug!("Network link {link} is already loaded");
                continue;
            }

            let linked = match fetcher.fetch_bytes(&link).await {
                Ok(data) => self.parse_document(&data),
                Err(err) => Err(err),
            };

            match linked {
                Ok(linked) => {
                    pending.extend(
                        linked
                            .links
                            .iter()
                            .map(|nested| (resolve_uri(Some(&link), nested), depth + 1)),
                    );
                    dataset.append(linked.dataset);
                }
                Err(err) => warn!("Failed to load network link {link}: {err}"),
            }
        }

        Ok(dataset)
    }
}

/// KMZ reader. Fails if the data is not a zip archive.
#[derive(Debug, Clone, Default)]
pub struct KmzReader {
    inner: KmlReader,
}

impl KmzReader {
    /// Creates a new reader.
    pub fn new(options: KmlReadOptions) -> Self {
        Self {
            inner: KmlReader::new(options),
        }
    }
}

impl SpatialReader for KmzReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        if !is_kmz(data) {
            return Err(GeoKitError::Format("KMZ data is not a zip archive".into()));
        }

        self.inner.parse(data)
    }
}

#[async_trait]
impl UriReader for KmzReader {
    async fn parse_uri(&self, uri: &str, fetcher: &dyn Fetcher) -> Result<SpatialDataSet, GeoKitError> {
        self.inner.parse_uri(uri, fetcher).await
    }
}

impl DocumentParser<'_> {
    fn strip(&self) -> bool {
        self.options.base.strip_html
    }

    fn collect_styles(&mut self, element: &XmlElement) {
        for child in element.elements() {
            if child.is("Style") {
                if let Some(id) = child.attr("id") {
                    self.dataset.styles.insert(id, read_style(child));
                }
            } else if !child.is("Placemark") {
                self.collect_styles(child);
            }
        }
    }

    /// Registers every `StyleMap` under its own id with the style of its `normal` pair.
    fn collect_style_maps(&mut self, element: &XmlElement) {
        for child in element.elements() {
            if !child.is("StyleMap") {
                self.collect_style_maps(child);
                continue;
            }

            let Some(id) = child.attr("id") else {
                continue;
            };

            let normal = child
                .children_named("Pair")
                .find(|pair| pair.child_string("key", false).as_deref() == Some("normal"));
            let Some(normal) = normal else {
                warn!("Style map {id} has no normal style");
                continue;
            };

            let referenced = normal
                .child_string("styleUrl", false)
                .and_then(|url| find_style(&self.dataset.styles, &url))
                .and_then(|style_id| self.dataset.styles.get(style_id).cloned());
            let inline = normal.child("Style").map(read_style);

            let style = match (referenced, inline) {
                (Some(base), Some(inline)) => base.merge(&inline),
                (Some(style), None) | (None, Some(style)) => style,
                (None, None) => {
                    warn!("Style of the style map {id} is not found");
                    continue;
                }
            };

            self.dataset.styles.insert(id, style);
        }
    }

    fn read_container(&mut self, element: &XmlElement) -> Result<(), GeoKitError> {
        for child in element.elements() {
            match child.name.as_str() {
                "Document" | "Folder" => self.read_container(child)?,
                "Placemark" => {
                    if let Some(geometry) = self.read_placemark(child)? {
                        self.dataset.geometries.push(geometry);
                    }
                }
                "NetworkLink" => {
                    let href = child
                        .child("Link")
                        .or_else(|| child.child("Url"))
                        .and_then(|link| link.child_string("href", false));
                    match href {
                        Some(href) => self.links.push(href),
                        None => warn!("Skipping network link without href"),
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn read_placemark(&mut self, placemark: &XmlElement) -> Result<Option<Geometry>, GeoKitError> {
        let mut geometry = None;
        for child in placemark.elements() {
            if let Some(value) = read_geometry(child)? {
                geometry = Some(value);
                break;
            }
        }

        let Some(mut geometry) = geometry else {
            warn!("Skipping placemark without geometry");
            return Ok(None);
        };

        let metadata = self.read_metadata(placemark);
        if metadata.has_metadata() || metadata.id.is_some() {
            *geometry.metadata_mut() = Some(metadata);
        }

        geometry.set_style_key(self.placemark_style(placemark));

        Ok(Some(geometry))
    }

    fn placemark_style(&mut self, placemark: &XmlElement) -> Option<StyleId> {
        let styles = &mut self.dataset.styles;
        let shared = placemark
            .child_string("styleUrl", false)
            .and_then(|url| find_style(styles, &url));
        let inline = placemark.child("Style").map(read_style);

        match (shared, inline) {
            (Some(id), Some(inline)) => {
                let base = styles.get(id).cloned().unwrap_or_default();
                Some(styles.insert_embedded(base.merge(&inline)))
            }
            (None, Some(inline)) => Some(styles.insert_embedded(inline)),
            (shared, None) => shared,
        }
    }

    fn read_metadata(&self, element: &XmlElement) -> ShapeMetadata {
        let mut metadata = ShapeMetadata::new();
        metadata.id = element.attr("id").map(String::from);
        metadata.title = element.child_string("name", self.strip());
        metadata.description = element.child_string("description", self.strip());

        if let Some(extended) = element.child("ExtendedData") {
            for data in extended.children_named("Data") {
                let Some(name) = data.attr("name") else {
                    continue;
                };
                if let Some(value) = data.child_string("value", self.strip()) {
                    metadata
                        .properties
                        .insert(name.to_string(), PropertyValue::String(value));
                }
            }

            for schema_data in extended.children_named("SchemaData") {
                for simple in schema_data.children_named("SimpleData") {
                    let (Some(name), Some(value)) = (simple.attr("name"), simple.value(self.strip())) else {
                        continue;
                    };
                    metadata
                        .properties
                        .insert(name.to_string(), PropertyValue::String(value));
                }
            }
        }

        metadata
    }
}

fn find_style(styles: &Styles, url: &str) -> Option<StyleId> {
    let key = match url.split_once('#') {
        Some((_, key)) => key,
        None => url,
    };

    let found = styles.find(key);
    if found.is_none() {
        debug!("Style {url} is not found in the document");
    }

    found
}

fn read_style(element: &XmlElement) -> ShapeStyle {
    let mut style = ShapeStyle::default();

    if let Some(icon_style) = element.child("IconStyle") {
        style.icon_url = icon_style
            .child("Icon")
            .and_then(|icon| icon.child_string("href", false));
        style.icon_scale = icon_style.child_f64("scale");
        style.icon_heading = icon_style.child_f64("heading");
        style.icon_color = icon_style.child_kml_color("color");
    }

    if let Some(line_style) = element.child("LineStyle") {
        style.stroke_color = line_style.child_kml_color("color");
        style.stroke_thickness = line_style.child_f64("width");
    }

    if let Some(poly_style) = element.child("PolyStyle") {
        style.fill_color = poly_style.child_kml_color("color");
        style.fill_polygon = poly_style.child_bool("fill");
        style.outline_polygon = poly_style.child_bool("outline");
    }

    style
}

fn coordinates(element: &XmlElement) -> Vec<Coordinate> {
    element
        .child("coordinates")
        .map(|c| parse_coordinates(&c.text()))
        .unwrap_or_default()
}

fn read_geometry(element: &XmlElement) -> Result<Option<Geometry>, GeoKitError> {
    let geometry = match element.name.as_str() {
        "Point" => {
            let Some(coordinate) = coordinates(element).into_iter().next() else {
                warn!("Skipping KML point without valid coordinates");
                return Ok(None);
            };
            Point::new(coordinate).into()
        }
        "LineString" | "LinearRing" => LineString::new(coordinates(element)).into(),
        "Polygon" => read_polygon(element).into(),
        "MultiGeometry" => {
            let mut members = vec![];
            for child in element.elements() {
                members.extend(read_geometry(child)?);
            }
            group_members(members)
        }
        _ => return Ok(None),
    };

    Ok(Some(geometry))
}

fn read_polygon(element: &XmlElement) -> Polygon {
    let ring = |boundary: &XmlElement| {
        boundary
            .child("LinearRing")
            .map(coordinates)
            .unwrap_or_default()
    };

    let exterior = element.child("outerBoundaryIs").map(ring).unwrap_or_default();
    let interiors = element
        .children_named("innerBoundaryIs")
        .map(|boundary| ring(boundary).into())
        .collect();

    Polygon::with_holes(exterior, interiors)
}

/// Converts members of a `MultiGeometry` into the matching multi-geometry when all of them are of the same kind.
fn group_members(members: Vec<Geometry>) -> Geometry {
    if !members.is_empty() && members.iter().all(|m| matches!(m, Geometry::Point(_))) {
        let points = members.into_iter().filter_map(|m| Point::try_from(m).ok()).collect();
        return MultiPoint::new(points).into();
    }

    if !members.is_empty() && members.iter().all(|m| matches!(m, Geometry::LineString(_))) {
        let lines = members.into_iter().filter_map(|m| LineString::try_from(m).ok()).collect();
        return MultiLineString::new(lines).into();
    }

    if !members.is_empty() && members.iter().all(|m| matches!(m, Geometry::Polygon(_))) {
        let polygons = members.into_iter().filter_map(|m| Polygon::try_from(m).ok()).collect();
        return MultiPolygon::new(polygons).into();
    }

    GeometryCollection::new(members).into()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use geokit_types::{latlon, GeometryType, Shape, StyleColor};

    use super::*;
    use crate::codec::kml::tests::zip;
    use crate::fetch::StaticFetcher;

    const DOCUMENT: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
        <kml xmlns="http://www.opengis.net/kml/2.2">
            <Document>
                <name>Sample</name>
                <Style id="line">
                    <LineStyle><color>ff0000ff</color><width>4</width></LineStyle>
                </Style>
                <Style id="pin">
                    <IconStyle><scale>1.5</scale><Icon><href>http://example.com/pin.png</href></Icon></IconStyle>
                </Style>
                <StyleMap id="pinMap">
                    <Pair><key>normal</key><styleUrl>#pin</styleUrl></Pair>
                    <Pair><key>highlight</key><styleUrl>#line</styleUrl></Pair>
                </StyleMap>
                <Folder>
                    <name>Points</name>
                    <Placemark id="p1">
                        <name>Office</name>
                        <description><![CDATA[<b>HQ</b>]]></description>
                        <styleUrl>#pinMap</styleUrl>
                        <ExtendedData>
                            <Data name="floor"><value>3</value></Data>
                            <SchemaData schemaUrl="#schema"><SimpleData name="kind">office</SimpleData></SchemaData>
                        </ExtendedData>
                        <Point><coordinates>-122.08,37.42,0</coordinates></Point>
                    </Placemark>
                </Folder>
                <Placemark>
                    <styleUrl>#line</styleUrl>
                    <Style><LineStyle><width>8</width></LineStyle></Style>
                    <LineString><coordinates>1,2 3,4</coordinates></LineString>
                </Placemark>
                <Placemark>
                    <Polygon>
                        <outerBoundaryIs><LinearRing><coordinates>0,0 10,0 10,10 0,0</coordinates></LinearRing></outerBoundaryIs>
                        <innerBoundaryIs><LinearRing><coordinates>1,1 1,2 2,2 1,1</coordinates></LinearRing></innerBoundaryIs>
                    </Polygon>
                </Placemark>
                <Placemark>
                    <MultiGeometry>
                        <Point><coordinates>1,1</coordinates></Point>
                        <Point><coordinates>2,2</coordinates></Point>
                    </MultiGeometry>
                </Placemark>
                <Placemark>
                    <MultiGeometry>
                        <Point><coordinates>1,1</coordinates></Point>
                        <LineString><coordinates>1,1 2,2</coordinates></LineString>
                    </MultiGeometry>
                </Placemark>
                <Placemark><name>Empty</name></Placemark>
            </Document>
        </kml>"##;

    #[test]
    fn document() {
        let dataset = KmlReader::default().parse(DOCUMENT.as_bytes()).unwrap();
        assert_eq!(dataset.geometries.len(), 5);
        assert_eq!(dataset.metadata.as_ref().unwrap().title.as_deref(), Some("Sample"));

        let point = &dataset.geometries[0];
        assert_matches!(point, Geometry::Point(p) if p.coordinate == latlon!(37.42, -122.08, 0.0));
        let metadata = point.metadata().unwrap();
        assert_eq!(metadata.id.as_deref(), Some("p1"));
        assert_eq!(metadata.title.as_deref(), Some("Office"));
        assert_eq!(metadata.description.as_deref(), Some("<b>HQ</b>"));
        assert_eq!(metadata.property("floor"), Some(&PropertyValue::String("3".into())));
        assert_eq!(metadata.property("kind"), Some(&PropertyValue::String("office".into())));

        let style = dataset.style_of(point).unwrap();
        assert_eq!(style.icon_url.as_deref(), Some("http://example.com/pin.png"));
        assert_eq!(style.icon_scale, Some(1.5));
        assert_eq!(dataset.styles.key(point.style_key().unwrap()), Some("pinMap"));

        let line = &dataset.geometries[1];
        let style = dataset.style_of(line).unwrap();
        assert_eq!(style.stroke_color, Some(StyleColor::rgba(255, 0, 0, 255)));
        assert_eq!(style.stroke_thickness, Some(8.0));
        assert!(dataset
            .styles
            .key(line.style_key().unwrap())
            .unwrap()
            .starts_with("embeddedStyle_"));

        assert_matches!(&dataset.geometries[2], Geometry::Polygon(p) if p.interior_rings.len() == 1);
        assert_eq!(dataset.geometries[3].geometry_type(), GeometryType::MultiPoint);
        assert_eq!(dataset.geometries[4].geometry_type(), GeometryType::GeometryCollection);
    }

    #[test]
    fn not_kml() {
        assert_matches!(
            KmlReader::default().parse(b"<gpx/>"),
            Err(GeoKitError::Format(_))
        );
        assert_matches!(
            KmzReader::default().parse(b"<kml/>"),
            Err(GeoKitError::Format(_))
        );
    }

    #[test]
    fn malformed_point_is_skipped() {
        let text = r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
            <Placemark><name>good</name><Point><coordinates>10,20</coordinates></Point></Placemark>
            <Placemark><name>bad</name><Point><coordinates>abc,def</coordinates></Point></Placemark>
        </Document></kml>"#;

        let dataset = KmlReader::default().parse(text.as_bytes()).unwrap();
        assert_eq!(dataset.geometries.len(), 1);
        assert_matches!(&dataset.geometries[0], Geometry::Point(p) if p.coordinate == latlon!(20.0, 10.0));
    }

    #[test]
    fn kmz() {
        let archive = zip(&[("doc.kml", DOCUMENT)]);
        let dataset = KmzReader::default().parse(&archive).unwrap();
        assert_eq!(dataset.geometries.len(), 5);

        let dataset = KmlReader::default().parse(&archive).unwrap();
        assert_eq!(dataset.geometries.len(), 5);
    }

    fn linked_document(index: usize, next: Option<&str>) -> String {
        let link = next
            .map(|href| format!("<NetworkLink><Link><href>{href}</href></Link></NetworkLink>"))
            .unwrap_or_default();
        format!(
            r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
                <Placemark><name>doc{index}</name><Point><coordinates>{index},0</coordinates></Point></Placemark>
                {link}
            </Document></kml>"#
        )
    }

    #[test]
    fn network_links() {
        let fetcher = StaticFetcher::new()
            .with("mem://data/0.kml", linked_document(0, Some("1.kml")))
            .with("mem://data/1.kml", linked_document(1, Some("mem://data/2.kml")))
            .with("mem://data/2.kml", linked_document(2, Some("3.kml")))
            .with("mem://data/3.kml", linked_document(3, Some("4.kml")))
            .with("mem://data/4.kml", linked_document(4, Some("0.kml")));

        let reader = KmlReader::default();
        let dataset = tokio_test::block_on(reader.read_uri("mem://data/0.kml", &fetcher));
        assert!(!dataset.is_error());
        let titles: Vec<_> = dataset.geometries.iter().filter_map(|g| g.title()).collect();
        assert_eq!(titles, vec!["doc0", "doc1", "doc2", "doc3"]);

        let dataset = reader.read(linked_document(0, Some("1.kml")).as_bytes());
        assert_eq!(dataset.geometries.len(), 1);
    }

    fn styled_document(color: &str, link: Option<&str>) -> String {
        let link = link
            .map(|href| format!("<NetworkLink><Link><href>{href}</href></Link></NetworkLink>"))
            .unwrap_or_default();
        format!(
            r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
                <Placemark>
                    <Style><LineStyle><color>{color}</color></LineStyle></Style>
                    <LineString><coordinates>0,0 1,1</coordinates></LineString>
                </Placemark>
                {link}
            </Document></kml>"#
        )
    }

    #[test]
    fn linked_documents_keep_their_inline_styles() {
        let fetcher = StaticFetcher::new()
            .with("mem://red.kml", styled_document("ff0000ff", Some("green.kml")))
            .with("mem://green.kml", styled_document("ff00ff00", None));

        let dataset = tokio_test::block_on(KmlReader::default().read_uri("mem://red.kml", &fetcher));
        assert_eq!(dataset.geometries.len(), 2);
        assert_eq!(dataset.styles.len(), 2);

        let colors: Vec<_> = dataset
            .geometries
            .iter()
            .map(|g| dataset.style_of(g).and_then(|s| s.stroke_color))
            .collect();
        assert_eq!(colors, vec![Some(StyleColor::RED), Some(StyleColor::GREEN)]);
    }

    #[test]
    fn network_links_disabled() {
        let fetcher = StaticFetcher::new()
            .with("mem://0.kml", linked_document(0, Some("mem://1.kml")))
            .with("mem://1.kml", linked_document(1, None));

        let reader = KmlReader::new(KmlReadOptions::default().with_network_links(false));
        let dataset = tokio_test::block_on(reader.read_uri("mem://0.kml", &fetcher));
        assert_eq!(dataset.geometries.len(), 1);

        let dataset = tokio_test::block_on(KmlReader::default().read_uri("mem://0.kml", &fetcher));
        assert_eq!(dataset.geometries.len(), 2);
        assert!(dataset.bounding_box.unwrap().contains(&latlon!(0.0, 1.0)));
    }

    #[test]
    fn broken_link_is_skipped() {
        let fetcher = StaticFetcher::new().with("mem://0.kml", linked_document(0, Some("mem://missing.kml")));
        let dataset = tokio_test::block_on(KmlReader::default().read_uri("mem://0.kml", &fetcher));
        assert!(!dataset.is_error());
        assert_eq!(dataset.geometries.len(), 1);
    }
}
