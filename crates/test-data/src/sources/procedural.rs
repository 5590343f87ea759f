//! Procedural route generation.

use gpx_creator::geo_math::polyline_length;
use gpx_creator::{Coordinate, RoutePolyline};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Bisection steps when solving for the detour offset.
const DETOUR_ITERATIONS: usize = 60;

/// Configuration for synthetic routes.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Number of vertices, endpoints included.
    pub point_count: usize,
    /// Target path length in meters. Shorter than the straight line means
    /// the straight line.
    pub length_meters: Option<f64>,
    /// Ratio between the widest and narrowest vertex spacing.
    pub spacing_variance: f64,
    /// GPS-style position noise on interior vertices, standard deviation in meters.
    pub jitter_m: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            point_count: 500,
            length_meters: None,
            spacing_variance: 4.0,
            jitter_m: 0.0,
        }
    }
}

/// Generates road-like polylines between two points.
///
/// The path bends once, at a detour point offset sideways from the midpoint
/// so the two legs add up to the target length. Vertices are spread along it
/// with random spacing, so some stretches are much denser than others.
#[derive(Debug, Clone, Default)]
pub struct RouteGenerator {
    config: RouteConfig,
}

impl RouteGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(mut self, count: usize) -> Self {
        self.config.point_count = count;
        self
    }

    pub fn with_length(mut self, meters: f64) -> Self {
        self.config.length_meters = Some(meters);
        self
    }

    pub fn with_spacing_variance(mut self, ratio: f64) -> Self {
        self.config.spacing_variance = ratio.max(1.0);
        self
    }

    pub fn with_jitter(mut self, meters: f64) -> Self {
        self.config.jitter_m = meters;
        self
    }

    /// Generates a route from `start` to `end`. Endpoints are exact.
    pub fn generate(
        &self,
        start: Coordinate,
        end: Coordinate,
        rng: &mut impl Rng,
    ) -> RoutePolyline {
        let count = self.config.point_count.max(2);
        let corner = self.detour_point(start, end);
        let legs = [start, corner, end];
        let total = polyline_length(&legs);

        let positions = self.vertex_positions(count, total, rng);
        let jitter = Normal::new(0.0, self.config.jitter_m.max(0.0) / 111_000.0).ok();

        positions
            .into_iter()
            .enumerate()
            .map(|(i, distance)| {
                if i == 0 {
                    return start;
                }
                if i == count - 1 {
                    return end;
                }
                let point = point_along(&legs, distance);
                match &jitter {
                    Some(noise) if self.config.jitter_m > 0.0 => Coordinate::new(
                        point.latitude + noise.sample(rng),
                        point.longitude + noise.sample(rng),
                    ),
                    _ => point,
                }
            })
            .collect()
    }

    /// Point sideways of the midpoint giving the two legs the target length.
    fn detour_point(&self, start: Coordinate, end: Coordinate) -> Coordinate {
        let mid = Coordinate::new(
            (start.latitude + end.latitude) / 2.0,
            (start.longitude + end.longitude) / 2.0,
        );
        let Some(target) = self.config.length_meters else {
            return mid;
        };
        if target <= polyline_length(&[start, end]) {
            return mid;
        }

        // Unit normal to the chord in degree space.
        let (dlat, dlon) = (end.latitude - start.latitude, end.longitude - start.longitude);
        let norm = dlat.hypot(dlon);
        if norm == 0.0 {
            return mid;
        }
        let (nlat, nlon) = (-dlon / norm, dlat / norm);
        let offset = |h: f64| Coordinate::new(mid.latitude + nlat * h, mid.longitude + nlon * h);
        let length_at = |h: f64| polyline_length(&[start, offset(h), end]);

        let mut hi = norm.max(0.01);
        while length_at(hi) < target && hi < 45.0 {
            hi *= 2.0;
        }
        let mut lo = 0.0;
        for _ in 0..DETOUR_ITERATIONS {
            let h = (lo + hi) / 2.0;
            if length_at(h) < target {
                lo = h;
            } else {
                hi = h;
            }
        }
        offset((lo + hi) / 2.0)
    }

    /// `count` increasing distances from 0 to `total`, unevenly spaced.
    fn vertex_positions(&self, count: usize, total: f64, rng: &mut impl Rng) -> Vec<f64> {
        let variance = self.config.spacing_variance.max(1.0);
        let steps: Vec<f64> = (1..count)
            .map(|_| {
                if variance > 1.0 {
                    rng.gen_range(1.0..variance)
                } else {
                    1.0
                }
            })
            .collect();
        let sum: f64 = steps.iter().sum();

        let mut positions = Vec::with_capacity(count);
        let mut acc = 0.0;
        positions.push(0.0);
        for step in &steps[..steps.len() - 1] {
            acc += step;
            positions.push(total * acc / sum);
        }
        positions.push(total);
        positions
    }
}

/// Point `distance` meters along the polyline, interpolated linearly in
/// degrees within a leg.
fn point_along(legs: &[Coordinate], distance: f64) -> Coordinate {
    let mut remaining = distance;
    for pair in legs.windows(2) {
        let leg = polyline_length(pair);
        if remaining <= leg {
            if leg == 0.0 {
                return pair[0];
            }
            let f = remaining / leg;
            return Coordinate::new(
                pair[0].latitude + (pair[1].latitude - pair[0].latitude) * f,
                pair[0].longitude + (pair[1].longitude - pair[0].longitude) * f,
            );
        }
        remaining -= leg;
    }
    legs[legs.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Place;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_route() {
        let mut rng = StdRng::seed_from_u64(42);
        let route = RouteGenerator::new()
            .with_points(3000)
            .with_length(80_000.0)
            .generate(Place::SAN_FRANCISCO, Place::SAN_JOSE, &mut rng);

        assert_eq!(route.len(), 3000);
        assert_eq!(route.first(), Some(Place::SAN_FRANCISCO));
        assert_eq!(route.last(), Some(Place::SAN_JOSE));

        let length = polyline_length(route.points());
        assert!((length - 80_000.0).abs() < 400.0, "length was {length}");
    }

    #[test]
    fn test_short_target_is_straight() {
        let mut rng = StdRng::seed_from_u64(1);
        let route = RouteGenerator::new()
            .with_points(50)
            .with_length(10.0)
            .generate(Place::SAN_FRANCISCO, Place::OAKLAND, &mut rng);

        let straight = polyline_length(&[Place::SAN_FRANCISCO, Place::OAKLAND]);
        let length = polyline_length(route.points());
        assert!((length - straight).abs() < 1.0);
    }

    #[test]
    fn test_spacing_is_uneven() {
        let mut rng = StdRng::seed_from_u64(9);
        let route = RouteGenerator::new()
            .with_points(200)
            .with_spacing_variance(10.0)
            .generate(Place::SAN_FRANCISCO, Place::SAN_JOSE, &mut rng);

        let gaps: Vec<f64> = route
            .points()
            .windows(2)
            .map(polyline_length)
            .collect();
        let min = gaps.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = gaps.iter().cloned().fold(0.0, f64::max);
        assert!(max / min > 3.0);
    }

    #[test]
    fn test_jitter_keeps_endpoints() {
        let mut rng = StdRng::seed_from_u64(3);
        let route = RouteGenerator::new()
            .with_points(100)
            .with_jitter(5.0)
            .generate(Place::SAN_FRANCISCO, Place::SAN_JOSE, &mut rng);

        assert_eq!(route.first(), Some(Place::SAN_FRANCISCO));
        assert_eq!(route.last(), Some(Place::SAN_JOSE));
        assert!(route.points().iter().all(|c| c.is_valid()));
    }

    #[test]
    fn test_two_points_minimum() {
        let mut rng = StdRng::seed_from_u64(0);
        let route = RouteGenerator::new()
            .with_points(0)
            .generate(Place::SAN_FRANCISCO, Place::SAN_JOSE, &mut rng);
        assert_eq!(route.points(), &[Place::SAN_FRANCISCO, Place::SAN_JOSE]);
    }
}
