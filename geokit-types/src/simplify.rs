//! Vertex reduction of coordinate sequences.

use crate::coordinate::Coordinate;
use crate::segment::Segment;

/// Simplifies a sequence of coordinates with the Douglas-Peucker algorithm.
///
/// `tolerance` is expressed in degrees, the same units as the coordinates. The first and the last coordinates are
/// always kept, and the result is always a subsequence of the input. Sequences shorter than 3 coordinates are returned
/// unchanged.
pub fn reduce_vertices(coordinates: &[Coordinate], tolerance: f64) -> Vec<Coordinate> {
    if coordinates.len() < 3 {
        return coordinates.to_vec();
    }

    let last_index = coordinates.len() - 1;
    let tolerance_sq = tolerance * tolerance;
    let mut keep = vec![false; coordinates.len()];
    keep[0] = true;
    keep[last_index] = true;

    let mut stack = vec![(0, last_index)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }

        let segment = Segment(&coordinates[first], &coordinates[last]);
        let mut max_distance = -1.0;
        let mut max_index = first;
        for (index, coord) in coordinates.iter().enumerate().take(last).skip(first + 1) {
            let distance = segment.distance_to_point_sq(coord);
            if distance > max_distance {
                max_distance = distance;
                max_index = index;
            }
        }

        if max_distance > tolerance_sq {
            keep[max_index] = true;
            stack.push((first, max_index));
            stack.push((max_index, last));
        }
    }

    coordinates
        .iter()
        .zip(keep)
        .filter_map(|(coord, keep)| keep.then_some(*coord))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latlon;

    fn zigzag() -> Vec<Coordinate> {
        vec![
            latlon!(0.0, 0.0),
            latlon!(0.0, 1.0),
            latlon!(0.5, 2.0),
            latlon!(0.0, 3.0),
            latlon!(-0.01, 4.0),
            latlon!(0.0, 5.0),
        ]
    }

    #[test]
    fn short_sequences_are_unchanged() {
        let line = vec![latlon!(0.0, 0.0), latlon!(1.0, 1.0)];
        assert_eq!(reduce_vertices(&line, 100.0), line);
        assert!(reduce_vertices(&[], 1.0).is_empty());
    }

    #[test]
    fn zero_tolerance_drops_only_collinear_points() {
        let line = vec![
            latlon!(0.0, 0.0),
            latlon!(0.0, 1.0),
            latlon!(0.0, 2.0),
            latlon!(1.0, 2.0),
        ];
        assert_eq!(
            reduce_vertices(&line, 0.0),
            vec![latlon!(0.0, 0.0), latlon!(0.0, 2.0), latlon!(1.0, 2.0)]
        );
    }

    #[test]
    fn tolerance_removes_small_deviations() {
        let reduced = reduce_vertices(&zigzag(), 0.35);
        assert_eq!(
            reduced,
            vec![latlon!(0.0, 0.0), latlon!(0.5, 2.0), latlon!(0.0, 5.0)]
        );
    }

    #[test]
    fn large_tolerance_collapses_to_endpoints() {
        let reduced = reduce_vertices(&zigzag(), 1000.0);
        assert_eq!(reduced, vec![latlon!(0.0, 0.0), latlon!(0.0, 5.0)]);
    }
}
