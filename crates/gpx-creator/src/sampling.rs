//! Distance-proportional polyline downsampling.
//!
//! Directions providers can return thousands of vertices, densely packed in
//! urban sections and sparse on highways. Picking every n-th vertex would keep
//! that uneven density; instead points are emitted at roughly equal intervals
//! of travelled distance.

use crate::geo_math::{polyline_length, segment_length};
use crate::models::Coordinate;

/// Default point budget for route exports.
pub const DEFAULT_MAX_POINTS: usize = 200;

/// Reduces `points` to at most `max_points` coordinates.
///
/// Inputs that already fit are returned unchanged. Otherwise the first and
/// last input coordinates are always kept. A `max_points` below 2 is raised
/// to 2 so both endpoints can be kept.
pub fn sample(points: &[Coordinate], max_points: usize) -> Vec<Coordinate> {
    if points.len() <= max_points.max(2) {
        return points.to_vec();
    }
    let max_points = max_points.max(2);
    let last_index = points.len() - 1;

    let target = polyline_length(points) / (max_points - 1) as f64;

    let mut sampled = Vec::with_capacity(max_points);
    sampled.push(points[0]);

    let mut accumulated = 0.0;
    for i in 1..points.len() {
        accumulated += segment_length(points[i - 1], points[i]);

        if accumulated >= target || i == last_index {
            push_distinct(&mut sampled, points[i]);
            accumulated = 0.0;

            if sampled.len() >= max_points - 1 && i < last_index {
                break;
            }
        }
    }

    push_distinct(&mut sampled, points[last_index]);
    sampled
}

fn push_distinct(sampled: &mut Vec<Coordinate>, point: Coordinate) {
    if sampled.last() != Some(&point) {
        sampled.push(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_line(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate::new(37.0 + i as f64 * 0.0001, -122.0))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(sample(&[], 200).is_empty());
    }

    #[test]
    fn test_identity_when_under_budget() {
        let points = straight_line(200);
        assert_eq!(sample(&points, 200), points);

        let single = vec![Coordinate::new(1.0, 1.0)];
        assert_eq!(sample(&single, 200), single);
    }

    #[test]
    fn test_downsample_respects_budget_and_endpoints() {
        let points = straight_line(3000);
        let sampled = sample(&points, 200);

        assert!(sampled.len() <= 200);
        assert!(sampled.len() > 150, "evenly spaced input should use most of the budget");
        assert_eq!(sampled.first(), points.first());
        assert_eq!(sampled.last(), points.last());
    }

    #[test]
    fn test_spacing_follows_distance_not_index() {
        // 1000 points crammed into the first 1% of the path, then 100 spread
        // over the rest.
        let mut points: Vec<Coordinate> = (0..1000)
            .map(|i| Coordinate::new(0.0, i as f64 * 0.000001))
            .collect();
        points.extend((1..=100).map(|i| Coordinate::new(0.0, 0.001 + i as f64 * 0.001)));

        let sampled = sample(&points, 50);
        let dense = sampled.iter().filter(|c| c.longitude < 0.001).count();
        assert!(dense <= 3, "dense prefix kept {dense} points");
        assert!(sampled.len() <= 50);
        assert_eq!(sampled.last(), points.last());
    }

    #[test]
    fn test_coincident_points_collapse() {
        let mut points = vec![Coordinate::new(5.0, 5.0); 10];
        points.push(Coordinate::new(5.0, 5.0));
        let sampled = sample(&points, 4);
        assert_eq!(sampled, vec![Coordinate::new(5.0, 5.0)]);
    }

    #[test]
    fn test_tiny_budget_is_clamped() {
        let points = straight_line(10);
        let sampled = sample(&points, 0);
        assert_eq!(sampled, vec![points[0], points[9]]);
    }
}
