use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::geometry::{Attributed, Geometry, Shape};
use crate::metadata::ShapeMetadata;
use crate::style::{ShapeStyle, Styles};

/// Result of reading a spatial feed and input of writing one.
///
/// Readers report failures through the `error` field when used through their `read*` methods: such a dataset has no
/// geometries and carries the error message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialDataSet {
    /// Geometries in document order.
    pub geometries: Vec<Geometry>,
    /// Extent of the data.
    pub bounding_box: Option<BoundingBox>,
    /// Styles referenced by the geometries.
    pub styles: Styles,
    /// Document level metadata.
    pub metadata: Option<ShapeMetadata>,
    /// Error message, if reading failed.
    pub error: Option<String>,
}

impl SpatialDataSet {
    /// Creates an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dataset from the list of geometries, computing its bounding box.
    pub fn from_geometries(geometries: Vec<Geometry>) -> Self {
        let mut dataset = Self {
            geometries,
            ..Default::default()
        };
        dataset.recompute_bounds();
        dataset
    }

    /// Creates a dataset that only carries an error message.
    pub fn from_error(error: impl Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Converts the result of a parse operation into a dataset, storing the error message in the `error` field.
    pub fn from_result<E: Display>(result: Result<Self, E>) -> Self {
        result.unwrap_or_else(Self::from_error)
    }

    /// Returns true if the dataset carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns true if there are no geometries in the dataset.
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Sets the document metadata.
    pub fn with_metadata(mut self, metadata: ShapeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Style of the geometry, if it has one and the style is in the table of this dataset.
    pub fn style_of(&self, geometry: &impl Attributed) -> Option<&ShapeStyle> {
        geometry.style_key().and_then(|id| self.styles.get(id))
    }

    /// Moves geometries and styles of the other dataset into this one, joining the bounding boxes.
    ///
    /// Styles of `other` with keys already present in this dataset are not copied; geometries referring to them
    /// refer to the existing styles after the merge. Embedded styles are the exception and get new keys instead
    /// (see [`Styles::append`]). Metadata and error of `other` are discarded.
    pub fn append(&mut self, other: SpatialDataSet) {
        let mapping = self.styles.append(other.styles);
        for mut geometry in other.geometries {
            geometry.remap_styles(&mapping);
            self.geometries.push(geometry);
        }

        self.bounding_box = match (self.bounding_box, other.bounding_box) {
            (Some(this), Some(other)) => Some(this.join(&other)),
            (this, other) => this.or(other),
        };
    }

    /// Sets the bounding box to the joined envelopes of all geometries.
    pub fn recompute_bounds(&mut self) {
        self.bounding_box = BoundingBox::join_all(self.geometries.iter().filter_map(|g| g.envelope()));
    }

    /// Simplifies all geometries. See [`Shape::reduce`].
    pub fn reduce(&mut self, tolerance: f64) {
        for geometry in &mut self.geometries {
            geometry.reduce(tolerance);
        }
    }

    /// Repairs all polygons. See [`Polygon::make_valid`](crate::Polygon::make_valid).
    pub fn make_valid(&mut self) {
        for geometry in &mut self.geometries {
            geometry.make_valid();
        }
    }
}
