use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::geometry::{Geometry, Shape};
use crate::geometry_type::GeometryType;
use crate::metadata::ShapeMetadata;
use crate::style::StyleId;

/// Heterogeneous collection of geometries. Members keep their own metadata and style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryCollection {
    /// Members of the collection.
    pub geometries: Vec<Geometry>,
    /// Metadata of the collection.
    pub metadata: Option<ShapeMetadata>,
    /// Style of the collection.
    pub style_key: Option<StyleId>,
}

impl GeometryCollection {
    /// Creates a new collection.
    pub fn new(geometries: Vec<Geometry>) -> Self {
        Self {
            geometries,
            metadata: None,
            style_key: None,
        }
    }
}

impl_attributed!(GeometryCollection);

impl Shape for GeometryCollection {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::GeometryCollection
    }

    fn num_geometries(&self) -> usize {
        self.geometries.len()
    }

    fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::join_all(self.geometries.iter().filter_map(|g| g.envelope()))
    }

    /// A collection has the dimension of its first member.
    fn is_3d(&self) -> bool {
        self.geometries.first().is_some_and(|g| g.is_3d())
    }

    fn num_points(&self) -> usize {
        self.geometries.iter().map(|g| g.num_points()).sum()
    }

    fn reduce(&mut self, tolerance: f64) {
        for geometry in &mut self.geometries {
            geometry.reduce(tolerance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latlon;
    use crate::point::Point;

    #[test]
    fn dimension_follows_first_member() {
        let flat = Point::new(latlon!(1.0, 2.0));
        let raised = Point::new(latlon!(1.0, 2.0, 3.0));

        assert!(!GeometryCollection::default().is_3d());
        assert!(!GeometryCollection::new(vec![flat.clone().into(), raised.clone().into()]).is_3d());
        assert!(GeometryCollection::new(vec![raised.into(), flat.into()]).is_3d());
    }
}
