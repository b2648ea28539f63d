//! See documentation for [`Geometry`].

use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::collection::GeometryCollection;
use crate::error::GeoKitTypesError;
use crate::geometry_type::GeometryType;
use crate::line_string::LineString;
use crate::metadata::ShapeMetadata;
use crate::multi::{MultiLineString, MultiPoint, MultiPolygon};
use crate::point::Point;
use crate::polygon::Polygon;
use crate::style::StyleId;

/// Properties every geometry variant can answer.
///
/// None of the methods fails: a geometry without coordinates has no envelope and zero points.
pub trait Shape {
    /// Kind of the geometry.
    fn geometry_type(&self) -> GeometryType;
    /// Number of child geometries. Single geometries count as one.
    fn num_geometries(&self) -> usize;
    /// Smallest box containing the geometry.
    fn envelope(&self) -> Option<BoundingBox>;
    /// Whether the first coordinate of the geometry carries altitude.
    fn is_3d(&self) -> bool;
    /// Total number of coordinates.
    fn num_points(&self) -> usize;
    /// Simplifies every line and ring of the geometry with the given tolerance (in degrees).
    fn reduce(&mut self, tolerance: f64);
}

/// Access to metadata and style reference attached to a geometry.
pub trait Attributed {
    /// Metadata of the geometry.
    fn metadata(&self) -> Option<&ShapeMetadata>;
    /// Mutable metadata slot of the geometry.
    fn metadata_mut(&mut self) -> &mut Option<ShapeMetadata>;
    /// Style of the geometry in the style table of its dataset.
    fn style_key(&self) -> Option<StyleId>;
    /// Sets the style of the geometry.
    fn set_style_key(&mut self, style_key: Option<StyleId>);

    /// Returns metadata of the geometry, creating empty metadata if there is none.
    fn metadata_or_default(&mut self) -> &mut ShapeMetadata {
        self.metadata_mut().get_or_insert_with(ShapeMetadata::default)
    }
}

/// A [`BoundingBox`] used as a member of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxShape {
    /// The box.
    pub bounds: BoundingBox,
    /// Metadata of the box.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the box.
    pub style_key: Option<StyleId>,
}

impl BoundingBoxShape {
    /// Creates a new shape.
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            metadata: None,
            style_key: None,
        }
    }
}

impl_attributed!(BoundingBoxShape);

impl Shape for BoundingBoxShape {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::BoundingBox
    }

    fn num_geometries(&self) -> usize {
        1
    }

    fn envelope(&self) -> Option<BoundingBox> {
        Some(self.bounds)
    }

    fn is_3d(&self) -> bool {
        false
    }

    fn num_points(&self) -> usize {
        4
    }

    fn reduce(&mut self, _tolerance: f64) {}
}

impl From<BoundingBox> for BoundingBoxShape {
    fn from(value: BoundingBox) -> Self {
        Self::new(value)
    }
}

/// Any geometry of a [`SpatialDataSet`](crate::SpatialDataSet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Point geometry.
    Point(Point),
    /// LineString geometry.
    LineString(LineString),
    /// Polygon geometry.
    Polygon(Polygon),
    /// MultiPoint geometry.
    MultiPoint(MultiPoint),
    /// MultiLineString geometry.
    MultiLineString(MultiLineString),
    /// MultiPolygon geometry.
    MultiPolygon(MultiPolygon),
    /// Geometry collection.
    GeometryCollection(GeometryCollection),
    /// Bounding box.
    BoundingBox(BoundingBoxShape),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Geometry::Point($inner) => $body,
            Geometry::LineString($inner) => $body,
            Geometry::Polygon($inner) => $body,
            Geometry::MultiPoint($inner) => $body,
            Geometry::MultiLineString($inner) => $body,
            Geometry::MultiPolygon($inner) => $body,
            Geometry::GeometryCollection($inner) => $body,
            Geometry::BoundingBox($inner) => $body,
        }
    };
}

impl Shape for Geometry {
    fn geometry_type(&self) -> GeometryType {
        dispatch!(self, g => g.geometry_type())
    }

    fn num_geometries(&self) -> usize {
        dispatch!(self, g => g.num_geometries())
    }

    fn envelope(&self) -> Option<BoundingBox> {
        dispatch!(self, g => g.envelope())
    }

    fn is_3d(&self) -> bool {
        dispatch!(self, g => g.is_3d())
    }

    fn num_points(&self) -> usize {
        dispatch!(self, g => g.num_points())
    }

    fn reduce(&mut self, tolerance: f64) {
        dispatch!(self, g => g.reduce(tolerance))
    }
}

impl Attributed for Geometry {
    fn metadata(&self) -> Option<&ShapeMetadata> {
        dispatch!(self, g => g.metadata())
    }

    fn metadata_mut(&mut self) -> &mut Option<ShapeMetadata> {
        dispatch!(self, g => g.metadata_mut())
    }

    fn style_key(&self) -> Option<StyleId> {
        dispatch!(self, g => g.style_key())
    }

    fn set_style_key(&mut self, style_key: Option<StyleId>) {
        dispatch!(self, g => g.set_style_key(style_key))
    }
}

impl Geometry {
    /// Repairs all polygons of the geometry. See [`Polygon::make_valid`].
    pub fn make_valid(&mut self) {
        match self {
            Geometry::Polygon(polygon) => polygon.make_valid(),
            Geometry::MultiPolygon(multi) => multi.make_valid(),
            Geometry::GeometryCollection(collection) => {
                for geometry in &mut collection.geometries {
                    geometry.make_valid();
                }
            }
            _ => {}
        }
    }

    /// Replaces the style references of the geometry and all of its members using the given mapping, indexed by
    /// [`StyleId::index`]. References that are out of the mapping range are dropped.
    pub fn remap_styles(&mut self, mapping: &[StyleId]) {
        fn remap(shape: &mut impl Attributed, mapping: &[StyleId]) {
            let new_key = shape
                .style_key()
                .and_then(|key| mapping.get(key.index()).copied());
            shape.set_style_key(new_key);
        }

        match self {
            Geometry::MultiPoint(multi) => {
                multi.points.iter_mut().for_each(|p| remap(p, mapping));
            }
            Geometry::MultiLineString(multi) => {
                multi.line_strings.iter_mut().for_each(|l| remap(l, mapping));
            }
            Geometry::MultiPolygon(multi) => {
                multi.polygons.iter_mut().for_each(|p| remap(p, mapping));
            }
            Geometry::GeometryCollection(collection) => {
                for geometry in &mut collection.geometries {
                    geometry.remap_styles(mapping);
                }
            }
            _ => {}
        }

        remap(self, mapping);
    }

    /// Returns the title of the geometry if there is one.
    pub fn title(&self) -> Option<&str> {
        self.metadata().and_then(|m| m.title.as_deref())
    }
}

macro_rules! impl_geometry_conversions {
    ($variant:ident, $shape:ty) => {
        impl From<$shape> for Geometry {
            fn from(value: $shape) -> Self {
                Geometry::$variant(value)
            }
        }

        impl TryFrom<Geometry> for $shape {
            type Error = GeoKitTypesError;

            fn try_from(value: Geometry) -> Result<Self, Self::Error> {
                match value {
                    Geometry::$variant(inner) => Ok(inner),
                    other => Err(GeoKitTypesError::UnexpectedKind {
                        expected: GeometryType::$variant,
                        found: other.geometry_type(),
                    }),
                }
            }
        }
    };
}

impl_geometry_conversions!(Point, Point);
impl_geometry_conversions!(LineString, LineString);
impl_geometry_conversions!(Polygon, Polygon);
impl_geometry_conversions!(MultiPoint, MultiPoint);
impl_geometry_conversions!(MultiLineString, MultiLineString);
impl_geometry_conversions!(MultiPolygon, MultiPolygon);
impl_geometry_conversions!(GeometryCollection, GeometryCollection);
impl_geometry_conversions!(BoundingBox, BoundingBoxShape);

impl From<BoundingBox> for Geometry {
    fn from(value: BoundingBox) -> Self {
        Geometry::BoundingBox(value.into())
    }
}
