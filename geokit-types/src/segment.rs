use crate::coordinate::Coordinate;

/// A straight line segment between two coordinates, treated in the planar longitude/latitude space.
#[derive(Debug, PartialEq)]
pub struct Segment<'a>(pub &'a Coordinate, pub &'a Coordinate);

impl Segment<'_> {
    /// Shortest planar distance (squared, in squared degrees) between a coordinate and the segment:
    ///
    /// * if the normal from the point to the segment ends inside the segment, the returned value is the squared length
    ///   of the normal
    /// * if the normal from the point to the segment ends outside of the segment, the returned value is the smaller one
    ///   of the distances between the point and the segment's endpoints
    pub fn distance_to_point_sq(&self, point: &Coordinate) -> f64 {
        if planar_eq(self.0, self.1) {
            return distance_sq(self.0, point);
        }

        let ds_x = self.1.longitude() - self.0.longitude();
        let ds_y = self.1.latitude() - self.0.latitude();
        let dp_x = point.longitude() - self.0.longitude();
        let dp_y = point.latitude() - self.0.latitude();
        let ds_len = ds_x * ds_x + ds_y * ds_y;

        let r = (dp_x * ds_x + dp_y * ds_y) / ds_len;
        if r <= 0.0 {
            distance_sq(self.0, point)
        } else if r >= 1.0 {
            distance_sq(self.1, point)
        } else {
            let s = (dp_y * ds_x - dp_x * ds_y) / ds_len;
            (s * s) * ds_len
        }
    }
}

fn planar_eq(a: &Coordinate, b: &Coordinate) -> bool {
    a.latitude() == b.latitude() && a.longitude() == b.longitude()
}

fn distance_sq(a: &Coordinate, b: &Coordinate) -> f64 {
    let dx = a.longitude() - b.longitude();
    let dy = a.latitude() - b.latitude();
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latlon;

    #[test]
    fn distance_to_point() {
        let a = latlon!(0.0, 0.0);
        let b = latlon!(0.0, 2.0);
        let segment = Segment(&a, &b);

        assert_eq!(segment.distance_to_point_sq(&latlon!(0.0, 1.0)), 0.0);
        assert_eq!(segment.distance_to_point_sq(&latlon!(1.0, 1.0)), 1.0);
        assert_eq!(segment.distance_to_point_sq(&latlon!(0.0, -2.0)), 4.0);
        assert_eq!(segment.distance_to_point_sq(&latlon!(1.0, 3.0)), 2.0);
    }

    #[test]
    fn degenerate_segment() {
        let a = latlon!(1.0, 1.0);
        let segment = Segment(&a, &a);
        assert_eq!(segment.distance_to_point_sq(&latlon!(1.0, 3.0)), 4.0);
    }
}
