//! Distance and viewport calculations over coordinates.

use geo::{BoundingRect, Distance as _, Haversine, LineString};

use crate::errors::GpxCreatorError;
use crate::models::{Coordinate, MapRegion, RegionSpan};

/// Smallest span used when zooming onto a point or a pair of points.
pub const MIN_VIEWPORT_SPAN_DEG: f64 = 0.05;

/// Padding factor applied when fitting two points into a viewport.
const PAIR_PADDING: f64 = 1.5;

/// Great-circle distance in meters between two valid coordinates.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> Result<f64, GpxCreatorError> {
    Ok(segment_length(a.validate()?, b.validate()?))
}

/// Sum of consecutive pairwise distances. Zero for fewer than two points.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| segment_length(pair[0], pair[1]))
        .sum()
}

/// Unchecked haversine distance; callers are expected to validate.
pub(crate) fn segment_length(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.distance(a.to_point(), b.to_point())
}

/// A square viewport of `span_deg` degrees centered on `center`.
pub fn region_around(center: Coordinate, span_deg: f64) -> MapRegion {
    MapRegion::new(center, RegionSpan::square(span_deg))
}

/// Viewport centered between two points with some padding around them.
pub fn region_between(a: Coordinate, b: Coordinate) -> MapRegion {
    let center = Coordinate::new(
        (a.latitude + b.latitude) / 2.0,
        (a.longitude + b.longitude) / 2.0,
    );
    let span = RegionSpan {
        latitude_delta: ((a.latitude - b.latitude).abs() * PAIR_PADDING).max(MIN_VIEWPORT_SPAN_DEG),
        longitude_delta: ((a.longitude - b.longitude).abs() * PAIR_PADDING)
            .max(MIN_VIEWPORT_SPAN_DEG),
    };
    MapRegion::new(center, span)
}

/// Viewport exactly covering the bounding rectangle of `points`.
pub fn bounding_region(points: &[Coordinate]) -> Option<MapRegion> {
    let line: LineString<f64> = points
        .iter()
        .map(|c| (c.longitude, c.latitude))
        .collect::<Vec<_>>()
        .into();
    let rect = line.bounding_rect()?;
    let center = rect.center();

    Some(MapRegion::new(
        Coordinate::new(center.y, center.x),
        RegionSpan {
            latitude_delta: rect.height(),
            longitude_delta: rect.width(),
        },
    ))
}
