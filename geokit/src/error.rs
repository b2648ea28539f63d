//! Error types used by the crate.

use geokit_types::{GeoKitTypesError, GeometryType};
use thiserror::Error;

/// Geokit error type.
#[derive(Debug, Error)]
pub enum GeoKitError {
    /// Header or magic number of a binary document is malformed.
    #[error("invalid format: {0}")]
    Format(String),
    /// Geometry or shape kind is recognized but cannot be handled.
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),
    /// Files that describe the same data do not agree with each other.
    #[error("inconsistent data: {0}")]
    DataInconsistency(String),
    /// Failed to load data from a URI.
    #[error("failed to load data: {0}")]
    Network(String),
    /// Operation is not implemented for the codec.
    #[error("operation is not supported: {0}")]
    NotSupported(&'static str),
    /// Document is malformed.
    #[error("failed to parse document: {0}")]
    Parse(String),
    /// XML error.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// JSON error.
    #[error("json error: {0}")]
    Json(String),
    /// Zip archive error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Error reading or writing a stream.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Geometry model error.
    #[error(transparent)]
    Geometry(#[from] GeoKitTypesError),
}

impl GeoKitError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub(crate) fn unsupported_geometry(geometry_type: GeometryType, format: &str) -> Self {
        Self::UnsupportedKind(format!("{geometry_type} cannot be written as {format}"))
    }
}

impl From<reqwest::Error> for GeoKitError {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(value.to_string())
    }
}

impl From<serde_json::Error> for GeoKitError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

impl From<geojson::Error> for GeoKitError {
    fn from(value: geojson::Error) -> Self {
        Self::Json(value.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for GeoKitError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(value.into())
    }
}

impl From<csv::Error> for GeoKitError {
    fn from(value: csv::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<dbase::Error> for GeoKitError {
    fn from(value: dbase::Error) -> Self {
        Self::Format(format!("invalid DBF table: {value}"))
    }
}

impl From<std::string::FromUtf8Error> for GeoKitError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        Self::Parse(value.to_string())
    }
}
