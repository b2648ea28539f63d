use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::coordinate::Coordinate;
use crate::orient::{ring_winding, Winding};
use crate::simplify::reduce_vertices;

/// Ordered sequence of coordinates. Used as the vertices of line strings and the rings of polygons.
///
/// A collection is considered closed when its first and last coordinates are exactly equal. Unlike a contour with
/// an implicit closing segment, rings of polygons repeat the first coordinate at the end.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateCollection {
    coordinates: Vec<Coordinate>,
}

impl std::ops::Deref for CoordinateCollection {
    type Target = Vec<Coordinate>;

    fn deref(&self) -> &Self::Target {
        &self.coordinates
    }
}

impl std::ops::DerefMut for CoordinateCollection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.coordinates
    }
}

impl CoordinateCollection {
    /// Creates a new collection.
    pub fn new(coordinates: Vec<Coordinate>) -> Self {
        Self { coordinates }
    }

    /// Returns the coordinates as a slice.
    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    /// Consumes the collection returning the coordinates.
    pub fn into_inner(self) -> Vec<Coordinate> {
        self.coordinates
    }

    /// Whether the first and the last coordinates are the same.
    pub fn is_closed(&self) -> bool {
        match (self.coordinates.first(), self.coordinates.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }

    /// Appends the first coordinate at the end, if the collection is not closed yet.
    pub fn close(&mut self) {
        if !self.is_closed() {
            if let Some(first) = self.coordinates.first().copied() {
                self.coordinates.push(first);
            }
        }
    }

    /// Returns true if the collection is a closed ring of at least 4 coordinates traversed counterclockwise.
    ///
    /// See [`ring_winding`] for the algorithm.
    pub fn is_ccw(&self) -> bool {
        crate::orient::is_ccw(&self.coordinates)
    }

    /// Winding of the collection considered as a closed ring. See [`ring_winding`].
    pub fn winding(&self) -> Option<Winding> {
        ring_winding(&self.coordinates)
    }

    /// Returns a copy of the collection in reversed order.
    pub fn reversed(&self) -> Self {
        Self {
            coordinates: self.coordinates.iter().rev().copied().collect(),
        }
    }

    /// Whether the first coordinate carries altitude.
    pub fn is_3d(&self) -> bool {
        self.coordinates
            .first()
            .map(Coordinate::has_altitude)
            .unwrap_or(false)
    }

    /// Bounding box spanning minimum and maximum longitude and latitude of all coordinates, or `None` for an empty
    /// collection. A collection that spans no area is expanded into a small box, see [`BoundingBox::from_coordinates`].
    pub fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::from_coordinates(self.coordinates.iter())
    }

    /// Reduces the number of vertices with the given tolerance (in degrees). See [`reduce_vertices`].
    pub fn reduce(&mut self, tolerance: f64) {
        self.coordinates = reduce_vertices(&self.coordinates, tolerance);
    }
}

impl From<Vec<Coordinate>> for CoordinateCollection {
    fn from(coordinates: Vec<Coordinate>) -> Self {
        Self::new(coordinates)
    }
}

impl FromIterator<Coordinate> for CoordinateCollection {
    fn from_iter<T: IntoIterator<Item = Coordinate>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for CoordinateCollection {
    type Item = Coordinate;
    type IntoIter = std::vec::IntoIter<Coordinate>;

    fn into_iter(self) -> Self::IntoIter {
        self.coordinates.into_iter()
    }
}

impl<'a> IntoIterator for &'a CoordinateCollection {
    type Item = &'a Coordinate;
    type IntoIter = std::slice::Iter<'a, Coordinate>;

    fn into_iter(self) -> Self::IntoIter {
        self.coordinates.iter()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::latlon;

    #[test]
    fn close() {
        let mut ring = CoordinateCollection::from(vec![
            latlon!(0.0, 0.0),
            latlon!(0.0, 1.0),
            latlon!(1.0, 1.0),
        ]);
        assert!(!ring.is_closed());
        ring.close();
        assert!(ring.is_closed());
        assert_eq!(ring.len(), 4);
        ring.close();
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn envelope() {
        let line = CoordinateCollection::from(vec![
            latlon!(10.0, -5.0),
            latlon!(-3.0, 20.0),
            latlon!(4.0, 7.0),
        ]);
        let envelope = line.envelope().unwrap();
        assert_abs_diff_eq!(envelope.west(), -5.0);
        assert_abs_diff_eq!(envelope.east(), 20.0);
        assert_abs_diff_eq!(envelope.south(), -3.0);
        assert_abs_diff_eq!(envelope.north(), 10.0);

        assert!(CoordinateCollection::default().envelope().is_none());
    }

    #[test]
    fn single_point_envelope_is_not_empty() {
        let envelope = CoordinateCollection::from(vec![latlon!(1.0, 2.0)])
            .envelope()
            .unwrap();
        assert_abs_diff_eq!(envelope.width(), 0.001);
        assert_abs_diff_eq!(envelope.height(), 0.001);
        assert_eq!(envelope.center(), latlon!(1.0, 2.0));
    }

    #[test]
    fn is_3d() {
        assert!(CoordinateCollection::from(vec![latlon!(1.0, 2.0, 3.0), latlon!(1.0, 2.0)]).is_3d());
        assert!(!CoordinateCollection::from(vec![latlon!(1.0, 2.0), latlon!(1.0, 2.0, 3.0)]).is_3d());
        assert!(!CoordinateCollection::default().is_3d());
    }
}
