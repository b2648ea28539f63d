//! Reader and writer of the tabular "Bing Spatial Data Services" data source format.
//!
//! A data source is a table of entities. Delimited files (comma, tab or pipe separated) start with the
//! `Bing Spatial Data Services, <version>, <entity type name>` line, followed by the header row with typed columns
//! in the `Name(Edm.Type[,primaryKey])` form. The XML variant describes the columns with an embedded XML schema.
//!
//! Each row becomes one geometry: the first parsable `Edm.Geography` cell (a WKT string) if there is one, or a
//! point built from the `Latitude` and `Longitude` columns. The primary key becomes the identifier of the
//! geometry, the `Name` and `Description` columns its title and description, and all other cells are stored as
//! typed metadata properties.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::sync::LazyLock;

use geokit_types::{Attributed, Coordinate, Geometry, Point, PropertyValue, Shape, ShapeMetadata, SpatialDataSet};
use log::warn;
use regex::Regex;

use crate::codec::wkt::{parse_geometry, to_wkt};
use crate::codec::{ReadOptions, SpatialReader, SpatialWriter, TextWriter, UriReader};
use crate::error::GeoKitError;
use crate::xml::{parse_bool, parse_datetime, strip_html};

mod delimited;
mod xml;

pub use delimited::SCHEMA_MARKER;

/// Name of the document metadata property holding the entity type name.
pub const ENTITY_TYPE_PROPERTY: &str = "entityTypeName";
/// Name of the document metadata property holding the data source name (only set by the XML variant).
pub const DATA_SOURCE_PROPERTY: &str = "dataSourceName";

/// Data source name used when no valid name is given.
pub const DEFAULT_DATA_SOURCE_NAME: &str = "MyDataSource";
/// Entity type name used when no valid name is given.
pub const DEFAULT_ENTITY_TYPE_NAME: &str = "MyEntityType";

const PRIMARY_KEY_COLUMN: &str = "EntityID";
const LATITUDE_COLUMN: &str = "Latitude";
const LONGITUDE_COLUMN: &str = "Longitude";
const GEOGRAPHY_COLUMN: &str = "Geography";
const NAME_COLUMN: &str = "Name";
const DESCRIPTION_COLUMN: &str = "Description";

const RESERVED_COLUMNS: [&str; 6] = [
    PRIMARY_KEY_COLUMN,
    LATITUDE_COLUMN,
    LONGITUDE_COLUMN,
    GEOGRAPHY_COLUMN,
    NAME_COLUMN,
    DESCRIPTION_COLUMN,
];

static DATA_SOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]{0,49}$").expect("valid regex"));
static ENTITY_TYPE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,49}$").expect("valid regex"));
static PROPERTY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,49}$").expect("valid regex"));

/// Layout of a data source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSourceFormat {
    /// Comma separated values.
    #[default]
    Csv,
    /// Tab separated values.
    Tab,
    /// Pipe (`|`) separated values.
    Pipe,
    /// XML document with an embedded schema.
    Xml,
}

impl DataSourceFormat {
    fn delimiter(&self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tab => Some(b'\t'),
            Self::Pipe => Some(b'|'),
            Self::Xml => None,
        }
    }
}

/// Options of the data source writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSourceOptions {
    /// Layout of the written document.
    pub format: DataSourceFormat,
    /// Name of the data source. If not set, the name stored in the dataset metadata is used.
    pub data_source_name: Option<String>,
    /// Name of the entity type. If not set, the name stored in the dataset metadata is used.
    pub entity_type_name: Option<String>,
}

impl DataSourceOptions {
    /// Creates options for the given format.
    pub fn new(format: DataSourceFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Sets the data source name.
    pub fn with_data_source_name(mut self, name: impl Into<String>) -> Self {
        self.data_source_name = Some(name.into());
        self
    }

    /// Sets the entity type name.
    pub fn with_entity_type_name(mut self, name: impl Into<String>) -> Self {
        self.entity_type_name = Some(name.into());
        self
    }
}

/// Type of a data source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdmType {
    /// Text.
    String,
    /// Integer. Both `Edm.Int32` and `Edm.Int64` are read as 64 bit values.
    Int64,
    /// Floating point number.
    Double,
    /// `true` or `false`.
    Boolean,
    /// Date and time.
    DateTime,
    /// Geometry written as WKT.
    Geography,
}

impl EdmType {
    /// Parses the type name used in delimited headers, with or without the `Edm.` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.strip_prefix("edm.").unwrap_or(&name) {
            "string" => Some(Self::String),
            "int16" | "int32" | "int64" | "long" => Some(Self::Int64),
            "double" | "single" | "decimal" => Some(Self::Double),
            "boolean" => Some(Self::Boolean),
            "datetime" | "datetimeoffset" => Some(Self::DateTime),
            "geography" => Some(Self::Geography),
            _ => None,
        }
    }

    /// Parses an XML schema type, such as `xs:long`.
    pub fn from_xsd(name: &str) -> Option<Self> {
        let name = name.rsplit(':').next().unwrap_or(name);
        match name {
            "string" => Some(Self::String),
            "short" | "int" | "long" | "integer" => Some(Self::Int64),
            "double" | "float" | "decimal" => Some(Self::Double),
            "boolean" => Some(Self::Boolean),
            "dateTime" | "date" => Some(Self::DateTime),
            "anyType" => Some(Self::Geography),
            _ => None,
        }
    }

    fn xsd_name(&self) -> &'static str {
        match self {
            Self::String => "xs:string",
            Self::Int64 => "xs:long",
            Self::Double => "xs:double",
            Self::Boolean => "xs:boolean",
            Self::DateTime => "xs:dateTime",
            Self::Geography => "xs:anyType",
        }
    }

    fn of(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::String(_) => Self::String,
            PropertyValue::Double(_) => Self::Double,
            PropertyValue::Int(_) => Self::Int64,
            PropertyValue::Bool(_) => Self::Boolean,
            PropertyValue::DateTime(_) => Self::DateTime,
        }
    }

    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int64, Self::Double) | (Self::Double, Self::Int64) => Self::Double,
            _ => Self::String,
        }
    }
}

impl Display for EdmType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "Edm.String",
            Self::Int64 => "Edm.Int64",
            Self::Double => "Edm.Double",
            Self::Boolean => "Edm.Boolean",
            Self::DateTime => "Edm.DateTime",
            Self::Geography => "Edm.Geography",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Column {
    pub name: String,
    pub edm_type: EdmType,
    pub primary_key: bool,
}

impl Column {
    fn new(name: &str, edm_type: EdmType) -> Self {
        Self {
            name: name.to_string(),
            edm_type,
            primary_key: false,
        }
    }

    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Raw content of a data source: column definitions and cell strings. Empty cells are `None`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub data_source_name: Option<String>,
    pub entity_type_name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Data source reader. The layout (delimited or XML) and the delimiter are detected from the content.
#[derive(Debug, Clone, Default)]
pub struct DataSourceReader {
    options: ReadOptions,
}

impl DataSourceReader {
    /// Creates a new reader.
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }

    fn convert(&self, table: Table) -> SpatialDataSet {
        let find = |name: &str| table.columns.iter().position(|c| c.is(name));
        let latitude = find(LATITUDE_COLUMN);
        let longitude = find(LONGITUDE_COLUMN);

        let mut dataset = SpatialDataSet::new();
        for (index, row) in table.rows.into_iter().enumerate() {
            let Some(mut geometry) = self.row_geometry(&table.columns, &row, latitude, longitude) else {
                warn!("Skipping data source row {} without location", index + 1);
                continue;
            };

            let metadata = self.row_metadata(&table.columns, row, [latitude, longitude]);
            if metadata.has_metadata() || metadata.id.is_some() {
                *geometry.metadata_mut() = Some(metadata);
            }
            dataset.geometries.push(geometry);
        }

        let mut metadata = ShapeMetadata::new().with_property(ENTITY_TYPE_PROPERTY, table.entity_type_name);
        if let Some(name) = table.data_source_name {
            metadata = metadata.with_property(DATA_SOURCE_PROPERTY, name);
        }
        dataset.metadata = Some(metadata);

        self.options.finish(&mut dataset);
        dataset
    }

    fn row_geometry(
        &self,
        columns: &[Column],
        row: &[Option<String>],
        latitude: Option<usize>,
        longitude: Option<usize>,
    ) -> Option<Geometry> {
        let geography = columns
            .iter()
            .zip(row)
            .filter(|(column, _)| column.edm_type == EdmType::Geography)
            .filter_map(|(column, cell)| Some((column, cell.as_deref()?)))
            .find_map(|(column, cell)| match parse_geometry(cell) {
                Ok(geometry) => Some(geometry),
                Err(err) => {
                    warn!("Skipping malformed value of column {}: {err}", column.name);
                    None
                }
            });
        if geography.is_some() {
            return geography;
        }

        let coordinate = |index: Option<usize>| -> Option<f64> {
            row.get(index?)?.as_deref()?.trim().parse::<f64>().ok()
        };
        let (latitude, longitude) = (coordinate(latitude)?, coordinate(longitude)?);
        Some(Point::new(Coordinate::new(latitude, longitude)).into())
    }

    fn row_metadata(
        &self,
        columns: &[Column],
        row: Vec<Option<String>>,
        location: [Option<usize>; 2],
    ) -> ShapeMetadata {
        let mut metadata = ShapeMetadata::new();
        for (index, (column, cell)) in columns.iter().zip(row).enumerate() {
            let Some(cell) = cell else {
                continue;
            };

            if column.primary_key {
                metadata.id = Some(cell);
            } else if column.edm_type == EdmType::Geography || location.contains(&Some(index)) {
                continue;
            } else if column.is(NAME_COLUMN) && column.edm_type == EdmType::String {
                metadata.title = Some(self.text(cell));
            } else if column.is(DESCRIPTION_COLUMN) && column.edm_type == EdmType::String {
                metadata.description = Some(self.text(cell));
            } else {
                match parse_cell(column.edm_type, &cell) {
                    Some(value) => {
                        metadata.properties.insert(column.name.clone(), value);
                    }
                    None => warn!("Skipping malformed value {cell:?} of column {}", column.name),
                }
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

fn parse_cell(edm_type: EdmType, cell: &str) -> Option<PropertyValue> {
    let cell = cell.trim();
    match edm_type {
        EdmType::String => Some(PropertyValue::String(cell.to_string())),
        EdmType::Int64 => cell.parse::<i64>().ok().map(PropertyValue::Int),
        EdmType::Double => cell.parse::<f64>().ok().map(PropertyValue::Double),
        EdmType::Boolean => parse_bool(cell).map(PropertyValue::Bool),
        EdmType::DateTime => parse_datetime(cell).map(PropertyValue::DateTime),
        EdmType::Geography => None,
    }
}

impl SpatialReader for DataSourceReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let text = std::str::from_utf8(data).map_err(|err| GeoKitError::parse(err.to_string()))?;
        let text = text.trim_start_matches('\u{feff}');
        let table = if text.trim_start().starts_with('<') {
            xml::read_table(text.as_bytes())?
        } else {
            delimited::read_table(text)?
        };

        Ok(self.convert(table))
    }
}

impl UriReader for DataSourceReader {}

/// Data source writer.
///
/// Writes an `EntityID` primary key column (filled from the geometry identifiers or row numbers), one column per
/// metadata property with the type inferred from the values, `Name` and `Description` columns when any geometry
/// has a title or description, and the `Latitude` and `Longitude` of every point (or of the envelope center of
/// other geometries). Datasets that contain anything but points get an additional `Geography` column.
///
/// Names that are not valid data source, entity type or property names are replaced with defaults.
#[derive(Debug, Clone, Default)]
pub struct DataSourceWriter {
    options: DataSourceOptions,
}

impl DataSourceWriter {
    /// Creates a new writer.
    pub fn new(options: DataSourceOptions) -> Self {
        Self { options }
    }

    pub(crate) fn build_table(&self, data: &SpatialDataSet) -> Table {
        let stored_name = |key: &str| {
            data.metadata
                .as_ref()
                .and_then(|m| m.property(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let data_source_name = validated_name(
            self.options.data_source_name.clone().or_else(|| stored_name(DATA_SOURCE_PROPERTY)),
            &DATA_SOURCE_NAME,
            DEFAULT_DATA_SOURCE_NAME,
        );
        let entity_type_name = validated_name(
            self.options.entity_type_name.clone().or_else(|| stored_name(ENTITY_TYPE_PROPERTY)),
            &ENTITY_TYPE_NAME,
            DEFAULT_ENTITY_TYPE_NAME,
        );

        let mut property_types: BTreeMap<&str, EdmType> = BTreeMap::new();
        for metadata in data.geometries.iter().filter_map(|g| g.metadata()) {
            for (key, value) in &metadata.properties {
                let edm_type = EdmType::of(value);
                property_types
                    .entry(key.as_str())
                    .and_modify(|t| *t = t.widen(edm_type))
                    .or_insert(edm_type);
            }
        }

        let has_title = data.geometries.iter().any(|g| g.title().is_some());
        let has_description = data
            .geometries
            .iter()
            .any(|g| g.metadata().and_then(|m| m.description.as_ref()).is_some());
        let has_geography = data.geometries.iter().any(|g| !matches!(g, Geometry::Point(_)));

        let mut columns = vec![Column {
            primary_key: true,
            ..Column::new(PRIMARY_KEY_COLUMN, EdmType::String)
        }];
        if has_title {
            columns.push(Column::new(NAME_COLUMN, EdmType::String));
        }
        if has_description {
            columns.push(Column::new(DESCRIPTION_COLUMN, EdmType::String));
        }

        let property_columns = property_column_names(property_types.keys().copied());
        for ((_, edm_type), name) in property_types.iter().zip(&property_columns) {
            columns.push(Column::new(name, *edm_type));
        }

        columns.push(Column::new(LATITUDE_COLUMN, EdmType::Double));
        columns.push(Column::new(LONGITUDE_COLUMN, EdmType::Double));
        if has_geography {
            columns.push(Column::new(GEOGRAPHY_COLUMN, EdmType::Geography));
        }

        let rows = data
            .geometries
            .iter()
            .enumerate()
            .map(|(index, geometry)| {
                let metadata = geometry.metadata();
                let mut row = vec![Some(
                    metadata
                        .and_then(|m| m.id.clone())
                        .unwrap_or_else(|| (index + 1).to_string()),
                )];
                if has_title {
                    row.push(geometry.title().map(str::to_string));
                }
                if has_description {
                    row.push(metadata.and_then(|m| m.description.clone()));
                }
                for key in property_types.keys() {
                    row.push(metadata.and_then(|m| m.property(key)).map(|v| v.to_string()));
                }

                let location = match geometry {
                    Geometry::Point(point) => Some(point.coordinate),
                    other => other.envelope().map(|envelope| envelope.center()),
                };
                row.push(location.map(|c| c.latitude().to_string()));
                row.push(location.map(|c| c.longitude().to_string()));
                if has_geography {
                    row.push(Some(to_wkt(geometry)));
                }

                row
            })
            .collect();

        Table {
            data_source_name: Some(data_source_name),
            entity_type_name,
            columns,
            rows,
        }
    }
}

impl SpatialWriter for DataSourceWriter {
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError> {
        let table = self.build_table(data);
        match self.options.format.delimiter() {
            Some(delimiter) => delimited::write_table(&table, delimiter, out),
            None => xml::write_table(&table, out),
        }
    }
}

impl TextWriter for DataSourceWriter {}

fn validated_name(name: Option<String>, pattern: &Regex, default: &str) -> String {
    match name {
        Some(name) if pattern.is_match(&name) => name,
        Some(name) => {
            warn!("Invalid name {name:?}, using {default:?} instead");
            default.to_string()
        }
        None => default.to_string(),
    }
}

/// Column names for the given property keys. Keys that are not valid property names or clash with the
/// synthesized columns are replaced with `PropertyN` names.
fn property_column_names<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let keys: Vec<&str> = keys.collect();
    let is_valid = |key: &str| {
        PROPERTY_NAME.is_match(key) && !RESERVED_COLUMNS.iter().any(|r| r.eq_ignore_ascii_case(key))
    };

    let mut generated = 0;
    keys.iter()
        .map(|key| {
            if is_valid(key) {
                return key.to_string();
            }

            loop {
                generated += 1;
                let name = format!("Property{generated}");
                if !keys.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
                    warn!("Property {key:?} is written as column {name}");
                    return name;
                }
            }
        })
        .collect()
}
