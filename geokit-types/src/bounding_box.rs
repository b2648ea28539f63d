use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::coordinate_collection::CoordinateCollection;
use crate::polygon::Polygon;

/// Size (in degrees) of the box that is used as the envelope of geometries that do not span any area.
pub const DEGENERATE_BOX_SIZE: f64 = 0.001;

/// Geographic rectangle defined by its center, width and height in degrees.
///
/// Longitude is treated as circular: a box can span the antimeridian, in which case its western edge has a larger
/// longitude value than its eastern edge. Latitude is linear and is not wrapped around the poles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    center: Coordinate,
    width: f64,
    height: f64,
}

impl BoundingBox {
    /// Creates a new box.
    pub fn new(center: Coordinate, width: f64, height: f64) -> Self {
        Self {
            center: center.without_altitude(),
            width: width.abs().min(360.0),
            height: height.abs(),
        }
    }

    /// Creates a box from its edges. If `east` is smaller than `west`, the box spans the antimeridian.
    pub fn from_edges(north: f64, south: f64, east: f64, west: f64) -> Self {
        let (north, south) = if north < south {
            (south, north)
        } else {
            (north, south)
        };
        let width = if east < west {
            east + 360.0 - west
        } else {
            east - west
        };

        Self::new(
            Coordinate::new(
                (north + south) / 2.0,
                Coordinate::normalize_longitude(west + width / 2.0),
            ),
            width,
            north - south,
        )
    }

    /// Smallest box containing all the given coordinates, or `None` if there are no coordinates.
    ///
    /// Longitudes are compared linearly. If the coordinates span no area (e.g. a single point), a box of
    /// [`DEGENERATE_BOX_SIZE`] degrees around them is returned.
    pub fn from_coordinates<'a>(mut coordinates: impl Iterator<Item = &'a Coordinate>) -> Option<Self> {
        let first = coordinates.next()?;
        let mut x_min = first.longitude();
        let mut x_max = first.longitude();
        let mut y_min = first.latitude();
        let mut y_max = first.latitude();

        for c in coordinates {
            x_min = x_min.min(c.longitude());
            x_max = x_max.max(c.longitude());
            y_min = y_min.min(c.latitude());
            y_max = y_max.max(c.latitude());
        }

        let center = Coordinate::new((y_min + y_max) / 2.0, (x_min + x_max) / 2.0);
        if x_max - x_min == 0.0 && y_max - y_min == 0.0 {
            return Some(Self::new(center, DEGENERATE_BOX_SIZE, DEGENERATE_BOX_SIZE));
        }

        Some(Self::new(center, x_max - x_min, y_max - y_min))
    }

    /// Joins all the boxes into one, or returns `None` if the iterator is empty.
    pub fn join_all(mut boxes: impl Iterator<Item = BoundingBox>) -> Option<Self> {
        let first = boxes.next()?;
        Some(boxes.fold(first, |acc, next| acc.join(&next)))
    }

    /// Center of the box.
    pub fn center(&self) -> Coordinate {
        self.center
    }

    /// Width of the box in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Height of the box in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Northern edge latitude (max Y).
    pub fn north(&self) -> f64 {
        self.center.latitude() + self.height / 2.0
    }

    /// Southern edge latitude (min Y).
    pub fn south(&self) -> f64 {
        self.center.latitude() - self.height / 2.0
    }

    /// Western edge longitude (min X), normalized into `[-180, 180]`.
    pub fn west(&self) -> f64 {
        Coordinate::normalize_longitude(self.center.longitude() - self.width / 2.0)
    }

    /// Eastern edge longitude (max X), normalized into `[-180, 180]`.
    pub fn east(&self) -> f64 {
        Coordinate::normalize_longitude(self.center.longitude() + self.width / 2.0)
    }

    /// Same as [`BoundingBox::west`].
    pub fn min_x(&self) -> f64 {
        self.west()
    }

    /// Same as [`BoundingBox::east`].
    pub fn max_x(&self) -> f64 {
        self.east()
    }

    /// Same as [`BoundingBox::south`].
    pub fn min_y(&self) -> f64 {
        self.south()
    }

    /// Same as [`BoundingBox::north`].
    pub fn max_y(&self) -> f64 {
        self.north()
    }

    /// Whether the box spans the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.center.longitude() - self.width / 2.0 < -180.0
            || self.center.longitude() + self.width / 2.0 > 180.0
    }

    /// Smallest box that contains both `self` and `other`.
    pub fn join(&self, other: &BoundingBox) -> Self {
        let (west, east) = self.lon_span();
        let (other_west, other_east) = other.lon_span_relative_to(self.center.longitude());

        let west = west.min(other_west);
        let east = east.max(other_east);
        let north = self.north().max(other.north());
        let south = self.south().min(other.south());

        Self::new(
            Coordinate::new(
                (north + south) / 2.0,
                Coordinate::normalize_longitude((west + east) / 2.0),
            ),
            east - west,
            north - south,
        )
    }

    /// Whether the coordinate lies inside the box or on its border.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        let lat = coordinate.latitude();
        if lat < self.south() || lat > self.north() {
            return false;
        }

        lon_delta(self.center.longitude(), coordinate.longitude()).abs() <= self.width / 2.0
    }

    /// Whether the `other` box lies completely inside this one.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        if other.south() < self.south() || other.north() > self.north() {
            return false;
        }

        let (west, east) = self.lon_span();
        let (other_west, other_east) = other.lon_span_relative_to(self.center.longitude());
        other_west >= west && other_east <= east
    }

    /// Whether the two boxes have at least one common point.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        let d_lat = (self.center.latitude() - other.center.latitude()).abs();
        let d_lon = lon_delta(self.center.longitude(), other.center.longitude()).abs();

        d_lat <= (self.height + other.height) / 2.0 && d_lon <= (self.width + other.width) / 2.0
    }

    /// Common area of two boxes, or `None` if they don't intersect.
    pub fn intersection(&self, other: &BoundingBox) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }

        let (west, east) = self.lon_span();
        let (other_west, other_east) = other.lon_span_relative_to(self.center.longitude());

        let west = west.max(other_west);
        let east = east.min(other_east);
        let north = self.north().min(other.north());
        let south = self.south().max(other.south());

        Some(Self::new(
            Coordinate::new(
                (north + south) / 2.0,
                Coordinate::normalize_longitude((west + east) / 2.0),
            ),
            east - west,
            north - south,
        ))
    }

    /// Closed counterclockwise ring going through the corners of the box.
    pub fn to_ring(&self) -> CoordinateCollection {
        let (north, south, east, west) = (self.north(), self.south(), self.east(), self.west());
        CoordinateCollection::new(vec![
            Coordinate::new(south, west),
            Coordinate::new(south, east),
            Coordinate::new(north, east),
            Coordinate::new(north, west),
            Coordinate::new(south, west),
        ])
    }

    /// Polygon covering the box.
    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(self.to_ring())
    }

    /// Western and eastern edges without normalization (the eastern can be larger than 180).
    fn lon_span(&self) -> (f64, f64) {
        (
            self.center.longitude() - self.width / 2.0,
            self.center.longitude() + self.width / 2.0,
        )
    }

    /// Western and eastern edges shifted by full turns to be as close as possible to the given longitude.
    fn lon_span_relative_to(&self, longitude: f64) -> (f64, f64) {
        let center = longitude + lon_delta(longitude, self.center.longitude());
        (center - self.width / 2.0, center + self.width / 2.0)
    }
}

/// Signed difference `to - from` in longitude, shifted by 360 degrees if it is larger than 180 degrees.
fn lon_delta(from: f64, to: f64) -> f64 {
    let delta = to - from;
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::latlon;

    #[test]
    fn edges() {
        let bbox = BoundingBox::from_edges(10.0, -10.0, 30.0, 10.0);
        assert_eq!(bbox.center(), latlon!(0.0, 20.0));
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 20.0);
        assert_eq!(bbox.west(), 10.0);
        assert_eq!(bbox.east(), 30.0);
        assert_eq!(bbox.min_y(), -10.0);
        assert_eq!(bbox.max_y(), 10.0);
    }

    #[test]
    fn antimeridian_edges() {
        let bbox = BoundingBox::from_edges(1.0, -1.0, -178.0, 178.0);
        assert_eq!(bbox.width(), 4.0);
        assert_eq!(bbox.center().longitude(), 180.0);
        assert!(bbox.crosses_antimeridian());
        assert_eq!(bbox.west(), 178.0);
        assert_eq!(bbox.east(), -178.0);
    }

    #[test]
    fn contains_across_antimeridian() {
        let bbox = BoundingBox::new(latlon!(0.0, 179.0), 4.0, 2.0);
        assert!(bbox.contains(&latlon!(0.0, -179.0)));
        assert!(bbox.contains(&latlon!(0.5, 178.0)));
        assert!(!bbox.contains(&latlon!(0.0, -170.0)));
        assert!(!bbox.contains(&latlon!(2.0, 179.0)));
    }

    #[test]
    fn contains_box() {
        let outer = BoundingBox::from_edges(10.0, -10.0, 10.0, -10.0);
        assert!(outer.contains_box(&BoundingBox::from_edges(5.0, -5.0, 5.0, -5.0)));
        assert!(!outer.contains_box(&BoundingBox::from_edges(5.0, -5.0, 15.0, -5.0)));

        let wrapped = BoundingBox::from_edges(10.0, -10.0, -170.0, 170.0);
        assert!(wrapped.contains_box(&BoundingBox::from_edges(1.0, -1.0, -175.0, 175.0)));
    }

    #[test]
    fn join() {
        let a = BoundingBox::from_edges(1.0, 0.0, 1.0, 0.0);
        let b = BoundingBox::from_edges(5.0, 4.0, 5.0, 4.0);
        let joined = a.join(&b);
        assert_abs_diff_eq!(joined.west(), 0.0);
        assert_abs_diff_eq!(joined.east(), 5.0);
        assert_abs_diff_eq!(joined.south(), 0.0);
        assert_abs_diff_eq!(joined.north(), 5.0);
    }

    #[test]
    fn join_across_antimeridian() {
        let a = BoundingBox::from_edges(1.0, 0.0, 179.0, 170.0);
        let b = BoundingBox::from_edges(1.0, 0.0, -170.0, -179.0);
        let joined = a.join(&b);
        assert_abs_diff_eq!(joined.width(), 20.0);
        assert_abs_diff_eq!(joined.west(), 170.0);
        assert_abs_diff_eq!(joined.east(), -170.0);
    }

    #[test]
    fn intersection() {
        let a = BoundingBox::from_edges(10.0, 0.0, 10.0, 0.0);
        let b = BoundingBox::from_edges(15.0, 5.0, 15.0, 5.0);
        assert!(a.intersects(&b));
        let common = a.intersection(&b).unwrap();
        assert_abs_diff_eq!(common.west(), 5.0);
        assert_abs_diff_eq!(common.east(), 10.0);
        assert_abs_diff_eq!(common.south(), 5.0);
        assert_abs_diff_eq!(common.north(), 10.0);

        let far = BoundingBox::from_edges(50.0, 40.0, 50.0, 40.0);
        assert!(!a.intersects(&far));
        assert!(a.intersection(&far).is_none());
    }

    #[test]
    fn intersects_across_antimeridian() {
        let a = BoundingBox::new(latlon!(0.0, 179.0), 4.0, 2.0);
        let b = BoundingBox::new(latlon!(0.0, -179.5), 2.0, 2.0);
        assert!(a.intersects(&b));
        let common = a.intersection(&b).unwrap();
        assert_abs_diff_eq!(common.width(), 1.5);
    }

    #[test]
    fn ring_is_ccw() {
        let ring = BoundingBox::from_edges(1.0, -1.0, 1.0, -1.0).to_ring();
        assert!(ring.is_closed());
        assert!(ring.is_ccw());
    }
}
