//! GeoJSON reader and writer.
//!
//! Positions are `[lon, lat, alt?]` arrays. Feature properties with string, number and boolean values become
//! metadata properties, other values are dropped. The `name` and `description` properties map to the title and
//! description of the metadata, and the feature `id` (or an `id` property) to its identifier.

use std::io::Write;

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue, LineStringType, PolygonType, Position, Value};
use geokit_types::{
    Attributed, BoundingBox, Coordinate, CoordinateCollection, Geometry, GeometryCollection, LineString,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, PropertyValue, Shape, ShapeMetadata, SpatialDataSet,
};
use log::warn;

use crate::codec::{ReadOptions, SpatialReader, SpatialWriter, TextWriter, UriReader};
use crate::error::GeoKitError;
use crate::xml::strip_html;

const NAME_PROPERTY: &str = "name";
const DESCRIPTION_PROPERTY: &str = "description";
const ID_PROPERTY: &str = "id";

/// GeoJSON reader.
#[derive(Debug, Clone, Default)]
pub struct GeoJsonReader {
    options: ReadOptions,
}

impl GeoJsonReader {
    /// Creates a new reader.
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }

    fn read_feature(&self, feature: Feature) -> Result<Option<Geometry>, GeoKitError> {
        let Some(geometry) = feature.geometry else {
            warn!("Skipping feature without geometry");
            return Ok(None);
        };

        let mut geometry = convert_geometry(&geometry.value)?;
        let metadata = self.read_metadata(feature.id, feature.properties);
        if metadata.has_metadata() || metadata.id.is_some() {
            *geometry.metadata_mut() = Some(metadata);
        }

        Ok(Some(geometry))
    }

    fn read_metadata(&self, id: Option<Id>, properties: Option<JsonObject>) -> ShapeMetadata {
        let mut metadata = ShapeMetadata::new();
        metadata.id = id.map(|id| match id {
            Id::String(value) => value,
            Id::Number(value) => value.to_string(),
        });

        for (key, value) in properties.unwrap_or_default() {
            match key.as_str() {
                NAME_PROPERTY => metadata.title = json_string(&value).map(|v| self.text(v)),
                DESCRIPTION_PROPERTY => metadata.description = json_string(&value).map(|v| self.text(v)),
                ID_PROPERTY if metadata.id.is_none() => metadata.id = json_string(&value),
                _ => match property_value(value) {
                    Some(value) => {
                        metadata.properties.insert(key, value);
                    }
                    None => warn!("Skipping property {key} with unsupported value type"),
                },
            }
        }

        metadata
    }

    fn text(&self, value: String) -> String {
        if self.options.strip_html {
            strip_html(&value)
        } else {
            value
        }
    }
}

impl SpatialReader for GeoJsonReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let text = std::str::from_utf8(data).map_err(|err| GeoKitError::parse(err.to_string()))?;
        let geojson = text.parse::<GeoJson>()?;

        let mut dataset = SpatialDataSet::new();
        match geojson {
            GeoJson::Geometry(geometry) => {
                dataset.geometries.push(convert_geometry(&geometry.value)?);
            }
            GeoJson::Feature(feature) => {
                dataset.geometries.extend(self.read_feature(feature)?);
            }
            GeoJson::FeatureCollection(collection) => {
                dataset.bounding_box = collection.bbox.as_deref().and_then(convert_bbox);
                for feature in collection.features {
                    dataset.geometries.extend(self.read_feature(feature)?);
                }
                if let Some(members) = collection.foreign_members {
                    let metadata = self.read_metadata(None, Some(members));
                    if metadata.has_metadata() {
                        dataset.metadata = Some(metadata);
                    }
                }
            }
        }

        self.options.finish(&mut dataset);
        Ok(dataset)
    }
}

impl UriReader for GeoJsonReader {}

/// GeoJSON writer.
///
/// A dataset with a single geometry that has no metadata is written as a bare geometry object. Any other dataset is
/// written as a `FeatureCollection` with a `bbox` member.
#[derive(Debug, Clone, Default)]
pub struct GeoJsonWriter;

impl GeoJsonWriter {
    fn to_geojson(&self, data: &SpatialDataSet) -> GeoJson {
        if let [single] = data.geometries.as_slice() {
            let has_metadata = single
                .metadata()
                .map(|m| m.has_metadata() || m.id.is_some())
                .unwrap_or(false);
            if !has_metadata {
                return GeoJson::Geometry(geojson::Geometry::new(geometry_value(single)));
            }
        }

        let features = data.geometries.iter().map(to_feature).collect();
        let bbox = data
            .bounding_box
            .or_else(|| BoundingBox::join_all(data.geometries.iter().filter_map(|g| g.envelope())))
            .map(|b| vec![b.west(), b.south(), b.east(), b.north()]);

        GeoJson::FeatureCollection(FeatureCollection {
            bbox,
            features,
            foreign_members: None,
        })
    }
}

impl SpatialWriter for GeoJsonWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        serde_json::to_writer(out, &self.to_geojson(data))?;
        Ok(())
    }
}

impl TextWriter for GeoJsonWriter {}

fn json_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(v) => Some(v.clone()),
        JsonValue::Number(v) => Some(v.to_string()),
        _ => None,
    }
}

fn property_value(value: JsonValue) -> Option<PropertyValue> {
    match value {
        JsonValue::String(v) => Some(PropertyValue::String(v)),
        JsonValue::Bool(v) => Some(PropertyValue::Bool(v)),
        JsonValue::Number(v) => match v.as_i64() {
            Some(int) => Some(PropertyValue::Int(int)),
            None => v.as_f64().map(PropertyValue::Double),
        },
        _ => None,
    }
}

fn json_value(value: &PropertyValue) -> JsonValue {
    match value {
        PropertyValue::String(v) => JsonValue::String(v.clone()),
        PropertyValue::Double(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        PropertyValue::Int(v) => JsonValue::Number((*v).into()),
        PropertyValue::Bool(v) => JsonValue::Bool(*v),
        PropertyValue::DateTime(v) => JsonValue::String(v.to_rfc3339()),
    }
}

fn convert_bbox(bbox: &[f64]) -> Option<BoundingBox> {
    match bbox {
        [west, south, east, north] | [west, south, _, east, north, _] => {
            Some(BoundingBox::from_edges(*north, *south, *east, *west))
        }
        _ => {
            warn!("Ignoring bbox with {} values", bbox.len());
            None
        }
    }
}

fn convert_position(position: &Position) -> Result<Coordinate, GeoKitError> {
    match position.as_slice() {
        [lon, lat] => Ok(Coordinate::new(*lat, *lon)),
        [lon, lat, alt, ..] => Ok(Coordinate::with_altitude(*lat, *lon, *alt)),
        _ => Err(GeoKitError::parse(format!(
            "position must have at least 2 values, {} found",
            position.len()
        ))),
    }
}

fn convert_contour(line_string: &LineStringType) -> Result<CoordinateCollection, GeoKitError> {
    line_string
        .iter()
        .map(convert_position)
        .collect::<Result<Vec<_>, _>>()
        .map(CoordinateCollection::from)
}

fn convert_polygon(polygon: &PolygonType) -> Result<Polygon, GeoKitError> {
    let mut rings = polygon
        .iter()
        .map(convert_contour)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_default();
    Ok(Polygon::with_holes(exterior, rings.collect()))
}

fn convert_geometry(value: &Value) -> Result<Geometry, GeoKitError> {
    let geometry = match value {
        Value::Point(position) => Point::new(convert_position(position)?).into(),
        Value::MultiPoint(positions) => MultiPoint::new(
            positions
                .iter()
                .map(|p| convert_position(p).map(Point::new))
                .collect::<Result<_, _>>()?,
        )
        .into(),
        Value::LineString(line) => LineString::new(convert_contour(line)?).into(),
        Value::MultiLineString(lines) => MultiLineString::new(
            lines
                .iter()
                .map(|l| convert_contour(l).map(LineString::new))
                .collect::<Result<_, _>>()?,
        )
        .into(),
        Value::Polygon(polygon) => convert_polygon(polygon)?.into(),
        Value::MultiPolygon(polygons) => MultiPolygon::new(
            polygons
                .iter()
                .map(convert_polygon)
                .collect::<Result<_, _>>()?,
        )
        .into(),
        Value::GeometryCollection(geometries) => GeometryCollection::new(
            geometries
                .iter()
                .map(|g| convert_geometry(&g.value))
                .collect::<Result<_, _>>()?,
        )
        .into(),
    };

    Ok(geometry)
}

fn position(coordinate: &Coordinate) -> Position {
    match coordinate.altitude() {
        Some(altitude) => vec![coordinate.longitude(), coordinate.latitude(), altitude],
        None => vec![coordinate.longitude(), coordinate.latitude()],
    }
}

fn contour(coordinates: &[Coordinate]) -> LineStringType {
    coordinates.iter().map(position).collect()
}

fn polygon(polygon: &Polygon) -> PolygonType {
    if polygon.exterior_ring.is_empty() {
        return vec![];
    }

    polygon.rings().map(|ring| contour(ring)).collect()
}

fn geometry_value(geometry: &Geometry) -> Value {
    match geometry {
        Geometry::Point(point) => Value::Point(position(&point.coordinate)),
        Geometry::LineString(line) => Value::LineString(contour(&line.vertices)),
        Geometry::Polygon(p) => Value::Polygon(polygon(p)),
        Geometry::MultiPoint(multi) => {
            Value::MultiPoint(multi.points.iter().map(|p| position(&p.coordinate)).collect())
        }
        Geometry::MultiLineString(multi) => {
            Value::MultiLineString(multi.line_strings.iter().map(|l| contour(&l.vertices)).collect())
        }
        Geometry::MultiPolygon(multi) => Value::MultiPolygon(multi.polygons.iter().map(polygon).collect()),
        Geometry::GeometryCollection(collection) => Value::GeometryCollection(
            collection
                .geometries
                .iter()
                .map(|g| geojson::Geometry::new(geometry_value(g)))
                .collect(),
        ),
        Geometry::BoundingBox(bounds) => Value::Polygon(polygon(&bounds.bounds.to_polygon())),
    }
}

fn to_feature(geometry: &Geometry) -> Feature {
    let mut properties = JsonObject::new();
    let mut id = None;

    if let Some(metadata) = geometry.metadata() {
        id = metadata.id.clone().map(Id::String);
        if let Some(title) = &metadata.title {
            properties.insert(NAME_PROPERTY.into(), JsonValue::String(title.clone()));
        }
        if let Some(description) = &metadata.description {
            properties.insert(DESCRIPTION_PROPERTY.into(), JsonValue::String(description.clone()));
        }
        for (key, value) in &metadata.properties {
            properties.insert(key.clone(), json_value(value));
        }
    }

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geometry_value(geometry))),
        id,
        properties: Some(properties),
        foreign_members: None,
    }
}
