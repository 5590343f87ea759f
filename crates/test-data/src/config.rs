//! Places and regions used by fixtures.

use gpx_creator::Coordinate;
pub use gpx_creator::models::BoundingBox;
use rand::Rng;

/// Fixture helpers on the core bounding box.
pub trait BoundingBoxExt {
    /// Returns a random point within the bounding box.
    fn random_point(&self, rng: &mut impl Rng) -> Coordinate;
}

impl BoundingBoxExt for BoundingBox {
    fn random_point(&self, rng: &mut impl Rng) -> Coordinate {
        let lat = rng.gen_range(self.min_lat..self.max_lat);
        let lon = rng.gen_range(self.min_lon..self.max_lon);
        Coordinate::new(lat, lon)
    }
}

/// Pre-defined regions.
#[derive(Debug, Clone, Copy)]
pub struct Region;

impl Region {
    /// San Francisco Bay, from Marin down to south San Jose.
    pub const BAY_AREA: BoundingBox = BoundingBox::new(37.2, -122.6, 38.0, -121.7);
}

/// Well-known points.
#[derive(Debug, Clone, Copy)]
pub struct Place;

impl Place {
    pub const SAN_FRANCISCO: Coordinate = Coordinate::new(37.7749, -122.4194);
    pub const SAN_JOSE: Coordinate = Coordinate::new(37.3382, -121.8863);
    pub const FERRY_BUILDING: Coordinate = Coordinate::new(37.7955, -122.3937);
    pub const OAKLAND: Coordinate = Coordinate::new(37.8044, -122.2712);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_point_within_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let p = Region::BAY_AREA.random_point(&mut rng);
            assert!(p.latitude >= 37.2 && p.latitude < 38.0);
            assert!(p.longitude >= -122.6 && p.longitude < -121.7);
        }
    }

    #[test]
    fn test_places_in_bay_area() {
        for p in [Place::SAN_FRANCISCO, Place::SAN_JOSE, Place::FERRY_BUILDING, Place::OAKLAND] {
            assert!(Region::BAY_AREA.contains(p));
        }
    }
}
