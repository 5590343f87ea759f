use std::fmt;
use std::sync::Arc;

use geo::geometry::Point;
use serde::{Deserialize, Serialize};

use crate::errors::GpxCreatorError;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn validate(self) -> Result<Self, GpxCreatorError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(GpxCreatorError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    pub fn key(&self) -> CoordinateKey {
        CoordinateKey::from(*self)
    }

    /// geo uses x = longitude, y = latitude.
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Text shown in an address field until reverse geocoding resolves.
    pub fn placeholder_label(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

impl From<Point<f64>> for Coordinate {
    fn from(point: Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Exact-match hash key for a coordinate. Positive and negative zero map to
/// the same key so that key equality agrees with `f64` equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateKey {
    latitude_bits: u64,
    longitude_bits: u64,
}

impl From<Coordinate> for CoordinateKey {
    fn from(c: Coordinate) -> Self {
        fn bits(v: f64) -> u64 {
            if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() }
        }
        Self {
            latitude_bits: bits(c.latitude),
            longitude_bits: bits(c.longitude),
        }
    }
}

/// Name of a search result as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayName {
    Named(String),
    #[default]
    Untitled,
}

impl DisplayName {
    /// Blank names are treated as absent.
    pub fn from_optional(name: Option<String>) -> Self {
        match name {
            Some(name) if !name.trim().is_empty() => DisplayName::Named(name),
            _ => DisplayName::Untitled,
        }
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            DisplayName::Named(name) => Some(name),
            DisplayName::Untitled => None,
        }
    }

    /// The name when present, otherwise the first non-blank fallback.
    pub fn or_fallbacks<'a>(&'a self, fallbacks: &[&'a str]) -> &'a str {
        self.as_named()
            .or_else(|| fallbacks.iter().copied().find(|f| !f.trim().is_empty()))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub display_name: DisplayName,
    pub subtitle: String,
    pub coordinate: Coordinate,
}

impl SearchResult {
    pub fn new(display_name: DisplayName, subtitle: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            display_name,
            subtitle: subtitle.into(),
            coordinate,
        }
    }

    pub fn named(name: impl Into<String>, subtitle: impl Into<String>, coordinate: Coordinate) -> Self {
        Self::new(DisplayName::Named(name.into()), subtitle, coordinate)
    }

    /// Text written into the address field when this result is picked.
    pub fn label(&self) -> &str {
        self.display_name.or_fallbacks(&[self.subtitle.as_str()])
    }
}

/// Reverse-geocoded address components, most specific first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placemark {
    pub name: Option<String>,
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
}

impl Placemark {
    pub const UNKNOWN_LABEL: &'static str = "Selected Location";

    pub fn address_label(&self) -> String {
        [&self.name, &self.locality, &self.administrative_area]
            .into_iter()
            .flatten()
            .find(|part| !part.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| Self::UNKNOWN_LABEL.to_string())
    }
}

/// Route geometry returned by a directions provider. Cheap to clone and
/// never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePolyline(Arc<[Coordinate]>);

impl RoutePolyline {
    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<Coordinate> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<Coordinate> {
        self.0.last().copied()
    }
}

impl From<Vec<Coordinate>> for RoutePolyline {
    fn from(points: Vec<Coordinate>) -> Self {
        Self(points.into())
    }
}

impl FromIterator<Coordinate> for RoutePolyline {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Degrees of latitude/longitude covered by a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSpan {
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl RegionSpan {
    pub const fn square(delta: f64) -> Self {
        Self {
            latitude_delta: delta,
            longitude_delta: delta,
        }
    }
}

/// Visible map area, also used as a search bias hint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub center: Coordinate,
    pub span: RegionSpan,
}

impl MapRegion {
    pub const fn new(center: Coordinate, span: RegionSpan) -> Self {
        Self { center, span }
    }

    /// Corners clamped to valid latitude/longitude.
    pub fn bounding_box(&self) -> BoundingBox {
        let half_lat = self.span.latitude_delta / 2.0;
        let half_lon = self.span.longitude_delta / 2.0;
        BoundingBox::new(
            (self.center.latitude - half_lat).max(-90.0),
            (self.center.longitude - half_lon).max(-180.0),
            (self.center.latitude + half_lat).min(90.0),
            (self.center.longitude + half_lon).min(180.0),
        )
    }
}

/// Geographic bounding box defined by southwest and northeast corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&c.latitude)
            && (self.min_lon..=self.max_lon).contains(&c.longitude)
    }
}

/// One of the two address fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Start,
    End,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Start, Field::End];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Start => "start",
            Field::End => "end",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the UI shows one address field or a start/end pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    #[default]
    Single,
    Two,
}

impl SelectionMode {
    pub fn toggled(self) -> Self {
        match self {
            SelectionMode::Single => SelectionMode::Two,
            SelectionMode::Two => SelectionMode::Single,
        }
    }
}
