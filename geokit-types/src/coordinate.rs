use approx::AbsDiffEq;
use serde::{Deserialize, Serialize};

/// Mean equatorial radius of the Earth in meters, used by spherical calculations.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// A point on the surface of the Earth with optional altitude.
///
/// Coordinates are values: they are created by the readers and never change after that. Equality is exact
/// comparison of all three fields, use [`AbsDiffEq`] when a tolerance is required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
}

impl Coordinate {
    /// Creates a new 2d coordinate.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Creates a new coordinate with altitude (in meters).
    pub const fn with_altitude(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: Some(altitude),
        }
    }

    /// Creates a new coordinate with optional altitude.
    pub const fn from_parts(latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Altitude in meters, if set.
    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    /// Returns true if the coordinate carries altitude.
    pub fn has_altitude(&self) -> bool {
        self.altitude.is_some()
    }

    /// Returns a copy of the coordinate without altitude.
    pub fn without_altitude(&self) -> Self {
        Self::new(self.latitude, self.longitude)
    }

    /// Wraps any longitude value into the `[-180, 180]` range.
    pub fn normalize_longitude(longitude: f64) -> f64 {
        if (-180.0..=180.0).contains(&longitude) {
            return longitude;
        }

        longitude - 360.0 * ((longitude + 180.0) / 360.0).floor()
    }

    /// Returns the point on the opposite side of the globe.
    pub fn inverse(&self) -> Self {
        Self {
            latitude: -self.latitude,
            longitude: Self::normalize_longitude(self.longitude + 180.0),
            altitude: self.altitude,
        }
    }

    /// Great-circle distance to the `other` coordinate in meters (haversine formula).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Coordinate reached by travelling `distance` meters from this one along the great circle that starts with
    /// the `heading` (degrees clockwise from north).
    pub fn destination(&self, heading: f64, distance: f64) -> Self {
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let bearing = heading.to_radians();
        let angular = distance / EARTH_RADIUS_METERS;

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lon2 = lon1
            + (bearing.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat2.sin());

        Self {
            latitude: lat2.to_degrees(),
            longitude: Self::normalize_longitude(lon2.to_degrees()),
            altitude: self.altitude,
        }
    }

    /// Approximates a circle around `center` with a closed ring of `points + 1` coordinates.
    ///
    /// `offset` rotates the first vertex clockwise from north (in degrees).
    pub fn regular_polygon(center: &Coordinate, radius: f64, points: usize, offset: f64) -> Vec<Self> {
        if points == 0 {
            return vec![];
        }

        let step = 360.0 / points as f64;
        let mut ring: Vec<Self> = (0..points)
            .map(|i| center.destination(offset + step * i as f64, radius))
            .collect();
        ring.push(ring[0]);
        ring
    }
}

impl AbsDiffEq for Coordinate {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        let altitude_eq = match (self.altitude, other.altitude) {
            (Some(a), Some(b)) => a.abs_diff_eq(&b, epsilon),
            (None, None) => true,
            _ => false,
        };

        altitude_eq
            && self.latitude.abs_diff_eq(&other.latitude, epsilon)
            && self.longitude.abs_diff_eq(&other.longitude, epsilon)
    }
}

/// Creates a new [`Coordinate`] from latitude and longitude values (in degrees), and an optional altitude.
///
/// ```
/// use geokit_types::latlon;
///
/// let point = latlon!(38.0, 52.0);
/// assert_eq!(point.latitude(), 38.0);
/// let point = latlon!(38.0, 52.0, 120.0);
/// assert_eq!(point.altitude(), Some(120.0));
/// ```
#[macro_export]
macro_rules! latlon {
    ($lat:expr, $lon:expr) => {
        $crate::coordinate::Coordinate::new($lat, $lon)
    };
    ($lat:expr, $lon:expr, $alt:expr) => {
        $crate::coordinate::Coordinate::with_altitude($lat, $lon, $alt)
    };
}
