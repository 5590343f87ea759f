//! Session configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geocode_cache::DEFAULT_GEOCODE_CACHE_CAPACITY;
use crate::models::{Coordinate, MapRegion, RegionSpan};
use crate::sampling::DEFAULT_MAX_POINTS;

/// Allowed simulation speeds in km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBounds {
    pub min_kmh: f64,
    pub max_kmh: f64,
}

impl SpeedBounds {
    pub fn contains(&self, speed_kmh: f64) -> bool {
        speed_kmh.is_finite() && speed_kmh >= self.min_kmh && speed_kmh <= self.max_kmh
    }

    /// Clamps into range, then rounds to the nearest 10 km/h.
    pub fn clamp_and_round(&self, speed_kmh: f64) -> f64 {
        let clamped = speed_kmh.clamp(self.min_kmh, self.max_kmh);
        ((clamped / 10.0).round() * 10.0).clamp(self.min_kmh, self.max_kmh)
    }
}

impl Default for SpeedBounds {
    fn default() -> Self {
        Self {
            min_kmh: 20.0,
            max_kmh: 100.0,
        }
    }
}

/// Tunables for a [`crate::session::Session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after the last keystroke before a search runs.
    pub search_debounce_ms: u64,

    /// Results kept per search; reaching it raises a truncation warning.
    pub max_search_results: usize,

    /// Side of the square search-bias window around the start point, in degrees.
    pub search_bias_span_deg: f64,

    pub geocode_cache_capacity: usize,

    /// Point budget for route exports.
    pub max_export_points: usize,

    pub speed_bounds: SpeedBounds,

    pub default_speed_kmh: f64,

    /// Viewport used before any location is known.
    pub fallback_region: MapRegion,

    pub error_notice_secs: u64,

    pub warning_notice_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 500,
            max_search_results: 5,
            search_bias_span_deg: 10.0,
            geocode_cache_capacity: DEFAULT_GEOCODE_CACHE_CAPACITY,
            max_export_points: DEFAULT_MAX_POINTS,
            speed_bounds: SpeedBounds::default(),
            default_speed_kmh: 20.0,
            fallback_region: MapRegion::new(
                Coordinate::new(22.47769553, 70.0467413),
                RegionSpan::square(0.15),
            ),
            error_notice_secs: 4,
            warning_notice_secs: 3,
        }
    }
}

impl SessionConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn error_notice_ttl(&self) -> Duration {
        Duration::from_secs(self.error_notice_secs)
    }

    pub fn warning_notice_ttl(&self) -> Duration {
        Duration::from_secs(self.warning_notice_secs)
    }

    /// Loads a JSON config file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Applies `GPX_CREATOR_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("GPX_CREATOR_DEBOUNCE_MS") {
            self.search_debounce_ms = v;
        }
        if let Some(v) = env_parse("GPX_CREATOR_CACHE_CAPACITY") {
            self.geocode_cache_capacity = v;
        }
        if let Some(v) = env_parse("GPX_CREATOR_MAX_POINTS") {
            self.max_export_points = v;
        }
        if let Some(v) = env_parse("GPX_CREATOR_SPEED_KMH") {
            self.default_speed_kmh = v;
        }
        self
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {name}={raw:?}: not a valid value");
            None
        }
    }
}
