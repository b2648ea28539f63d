//! Descriptive information attached to geometries and datasets.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value of a metadata property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Text value.
    String(String),
    /// Floating point number.
    Double(f64),
    /// Integer number.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// Point in time.
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    /// Returns the string value, if the property is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as `f64` for numeric properties.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the integer value, if the property is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean value, if the property is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the time value, if the property is a date.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::String(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

/// Title, description, identifier and free-form properties of a geometry or a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeMetadata {
    /// Identifier of the shape in the source document.
    pub id: Option<String>,
    /// Title (name) of the shape.
    pub title: Option<String>,
    /// Description of the shape. Can contain HTML.
    pub description: Option<String>,
    /// Additional properties.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl ShapeMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if title or description is non-empty, or there is at least one property. Identifier alone is
    /// not considered metadata.
    pub fn has_metadata(&self) -> bool {
        let non_empty = |v: &Option<String>| v.as_deref().map(|s| !s.is_empty()).unwrap_or(false);
        non_empty(&self.title) || non_empty(&self.description) || !self.properties.is_empty()
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a property by its key.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Copies all non-empty fields and properties of the `other` into this instance.
    pub fn merge(&mut self, other: ShapeMetadata) {
        if other.id.is_some() {
            self.id = other.id;
        }
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        self.properties.extend(other.properties);
    }
}
