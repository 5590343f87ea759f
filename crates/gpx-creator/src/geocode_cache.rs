//! Bounded reverse-geocode cache.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{Coordinate, CoordinateKey};

pub const DEFAULT_GEOCODE_CACHE_CAPACITY: usize = 50;

/// Coordinate → address cache with exact-match lookups.
///
/// When full, inserting a new key evicts whichever entry the map yields
/// first. This is not LRU. Not synchronized; the owner serializes access.
#[derive(Debug, Clone)]
pub struct GeocodeCache {
    entries: HashMap<CoordinateKey, String>,
    capacity: usize,
}

impl GeocodeCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&self, coordinate: Coordinate) -> Option<&str> {
        self.entries.get(&coordinate.key()).map(String::as_str)
    }

    pub fn put(&mut self, coordinate: Coordinate, address: impl Into<String>) {
        let key = coordinate.key();

        if !self.entries.contains_key(&key)
            && self.entries.len() >= self.capacity
            && let Some(victim) = self.entries.keys().next().copied()
        {
            self.entries.remove(&victim);
            debug!("Geocode cache full ({}), evicted one entry", self.capacity);
        }

        self.entries.insert(key, address.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::new(DEFAULT_GEOCODE_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(i: usize) -> Coordinate {
        Coordinate::new(10.0 + i as f64 * 0.01, 20.0)
    }

    #[test]
    fn test_exact_match_only() {
        let mut cache = GeocodeCache::default();
        cache.put(coord(0), "Main Street");

        assert_eq!(cache.get(coord(0)), Some("Main Street"));
        assert_eq!(cache.get(Coordinate::new(10.000001, 20.0)), None);
    }

    #[test]
    fn test_capacity_plus_one() {
        let mut cache = GeocodeCache::new(50);
        for i in 0..=50 {
            cache.put(coord(i), format!("Address {i}"));
        }

        assert_eq!(cache.len(), 50);
        assert_eq!(cache.get(coord(50)), Some("Address 50"));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache = GeocodeCache::new(2);
        cache.put(coord(0), "a");
        cache.put(coord(1), "b");
        cache.put(coord(1), "b2");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(coord(0)), Some("a"));
        assert_eq!(cache.get(coord(1)), Some("b2"));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut cache = GeocodeCache::new(0);
        cache.put(coord(0), "a");
        cache.put(coord(1), "b");
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(coord(1)), Some("b"));
    }
}
