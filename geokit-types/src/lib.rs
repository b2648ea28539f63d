//! Geometry model shared by all geokit feed codecs.
//!
//! The crate contains:
//! * [`Coordinate`] and [`CoordinateCollection`] value types,
//! * a closed set of geometry variants united by the [`Geometry`] enum, each of which can carry
//!   [`ShapeMetadata`] and a [`StyleId`] reference into the style table of its dataset,
//! * [`ShapeStyle`] and the [`Styles`] arena,
//! * [`SpatialDataSet`], the unit every reader produces and every writer consumes,
//! * computational geometry used by the codecs: ring orientation, polygon repair, vertex reduction,
//!   point-in-polygon tests and longitude-wrap aware bounding box algebra.

macro_rules! impl_attributed {
    ($shape:ident) => {
        impl $crate::geometry::Attributed for $shape {
            fn metadata(&self) -> Option<&$crate::metadata::ShapeMetadata> {
                self.metadata.as_ref()
            }

            fn metadata_mut(&mut self) -> &mut Option<$crate::metadata::ShapeMetadata> {
                &mut self.metadata
            }

            fn style_key(&self) -> Option<$crate::style::StyleId> {
                self.style_key
            }

            fn set_style_key(&mut self, style_key: Option<$crate::style::StyleId>) {
                self.style_key = style_key;
            }
        }

        impl $shape {
            /// Sets metadata of the shape.
            pub fn with_metadata(mut self, metadata: $crate::metadata::ShapeMetadata) -> Self {
                self.metadata = Some(metadata);
                self
            }

            /// Sets the style of the shape.
            pub fn with_style(mut self, style_key: $crate::style::StyleId) -> Self {
                self.style_key = Some(style_key);
                self
            }
        }
    };
}

pub mod bounding_box;
pub mod collection;
pub mod coordinate;
pub mod coordinate_collection;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod geometry_type;
pub mod line_string;
pub mod metadata;
pub mod multi;
pub mod orient;
pub mod point;
pub mod polygon;
pub mod segment;
pub mod simplify;
pub mod style;

pub use bounding_box::BoundingBox;
pub use collection::GeometryCollection;
pub use coordinate::Coordinate;
pub use coordinate_collection::CoordinateCollection;
pub use dataset::SpatialDataSet;
pub use error::GeoKitTypesError;
pub use geometry::{Attributed, BoundingBoxShape, Geometry, Shape};
pub use geometry_type::GeometryType;
pub use line_string::LineString;
pub use metadata::{PropertyValue, ShapeMetadata};
pub use multi::{MultiLineString, MultiPoint, MultiPolygon};
pub use point::Point;
pub use polygon::Polygon;
pub use style::{ShapeStyle, StyleColor, StyleId, Styles};
