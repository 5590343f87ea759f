//! GPX 1.1 generation for routes and single waypoints.
//!
//! Routes are written as a `<wpt>` sequence rather than a `<trk>`, with
//! synthetic timestamps spaced by the simulated travel time between points,
//! which is what device location simulators replay as movement.

use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::errors::GpxCreatorError;
use crate::geo_math::distance_meters;
use crate::models::Coordinate;
use crate::sampling::{self, DEFAULT_MAX_POINTS};

const CREATOR: &str = "GPX Creator";
const WAYPOINT_FALLBACK_NAME: &str = "Waypoint";

/// Serialized GPX text plus a filename stem the caller can offer when saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpxExport {
    pub content: String,
    pub suggested_filename: String,
}

impl GpxExport {
    /// Suggested filename with the `.gpx` extension.
    pub fn file_name(&self) -> String {
        format!("{}.gpx", self.suggested_filename)
    }
}

/// Generates route GPX, downsampled to the default point budget.
///
/// The first waypoint is stamped with `now`; every following one advances the
/// clock by the whole seconds needed to cover the segment at `speed_kmh`, and
/// at least one second.
pub fn serialize_route(
    points: &[Coordinate],
    speed_kmh: f64,
    start_label: &str,
    end_label: &str,
    now: OffsetDateTime,
) -> Result<String, GpxCreatorError> {
    serialize_route_with_limit(points, DEFAULT_MAX_POINTS, speed_kmh, start_label, end_label, now)
}

/// Same as [`serialize_route`] with an explicit point budget.
pub fn serialize_route_with_limit(
    points: &[Coordinate],
    max_points: usize,
    speed_kmh: f64,
    start_label: &str,
    end_label: &str,
    now: OffsetDateTime,
) -> Result<String, GpxCreatorError> {
    if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
        return Err(GpxCreatorError::non_positive_speed(speed_kmh));
    }
    let speed_mps = speed_kmh / 3.6;

    let sampled = sampling::sample(points, max_points);
    let start_name = if start_label.trim().is_empty() { "Start" } else { start_label };
    let end_name = if end_label.trim().is_empty() { "End" } else { end_label };

    let mut clock = whole_seconds_utc(now);
    let mut gpx = String::with_capacity(128 + sampled.len() * 96);
    push_header(&mut gpx);

    gpx.push_str("  <metadata>\n");
    gpx.push_str(&format!(
        "    <name>Route from {} to {}</name>\n",
        escape_xml(start_name),
        escape_xml(end_name)
    ));
    gpx.push_str(&format!("    <time>{}</time>\n", format_timestamp(clock)?));
    gpx.push_str("  </metadata>\n");

    let mut previous: Option<Coordinate> = None;
    for coord in sampled {
        if let Some(prev) = previous {
            let meters = distance_meters(prev, coord)?;
            clock = travel_seconds(meters, speed_mps)
                .and_then(|secs| clock.checked_add(Duration::seconds(secs)))
                .ok_or_else(|| GpxCreatorError::speed_too_slow(speed_kmh))?;
        } else {
            coord.validate()?;
        }
        previous = Some(coord);

        push_wpt(&mut gpx, coord, None, clock)?;
    }

    gpx.push_str("</gpx>\n");
    Ok(gpx)
}

/// Generates a GPX document holding one named waypoint stamped with `now`.
pub fn serialize_waypoint(
    coordinate: Coordinate,
    label: &str,
    now: OffsetDateTime,
) -> Result<String, GpxCreatorError> {
    let coordinate = coordinate.validate()?;

    let mut gpx = String::with_capacity(512);
    push_header(&mut gpx);
    push_wpt(&mut gpx, coordinate, Some(label), whole_seconds_utc(now))?;
    gpx.push_str("</gpx>\n");
    Ok(gpx)
}

/// `"{start}_to_{end}"` built from the first comma-separated part of each label.
pub fn route_filename(start_label: &str, end_label: &str) -> String {
    let name = format!(
        "{}_to_{}",
        first_segment(start_label),
        first_segment(end_label)
    );
    let cleaned = sanitize_filename(&name);
    if cleaned.is_empty() { "Route".to_string() } else { cleaned }
}

/// Filename stem from the first comma-separated part of the label.
pub fn waypoint_filename(label: &str) -> String {
    let cleaned = sanitize_filename(first_segment(label));
    if cleaned.is_empty() {
        WAYPOINT_FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// End label if present, else start label, else `"Waypoint"`.
pub fn waypoint_label<'a>(end_label: &'a str, start_label: &'a str) -> &'a str {
    [end_label, start_label]
        .into_iter()
        .find(|label| !label.trim().is_empty())
        .unwrap_or(WAYPOINT_FALLBACK_NAME)
}

/// Whole seconds to cover `meters`, at least one. `None` when the result does
/// not fit a timestamp offset.
fn travel_seconds(meters: f64, speed_mps: f64) -> Option<i64> {
    let secs = (meters / speed_mps).floor();
    if !secs.is_finite() || secs >= i64::MAX as f64 {
        return None;
    }
    Some((secs as i64).max(1))
}

fn whole_seconds_utc(t: OffsetDateTime) -> OffsetDateTime {
    let t = t.to_offset(UtcOffset::UTC);
    t - Duration::nanoseconds(i64::from(t.nanosecond()))
}

fn format_timestamp(t: OffsetDateTime) -> Result<String, GpxCreatorError> {
    Ok(t.format(&Rfc3339)?)
}

fn push_header(gpx: &mut String) {
    gpx.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    gpx.push('\n');
    gpx.push_str(&format!(r#"<gpx version="1.1" creator="{CREATOR}""#));
    gpx.push_str(r#" xmlns="http://www.topografix.com/GPX/1/1""#);
    gpx.push_str(r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#);
    gpx.push_str(r#" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">"#);
    gpx.push('\n');
}

fn push_wpt(
    gpx: &mut String,
    coord: Coordinate,
    name: Option<&str>,
    time: OffsetDateTime,
) -> Result<(), GpxCreatorError> {
    // `{}` prints the shortest representation that parses back to the same f64.
    gpx.push_str(&format!(
        r#"  <wpt lat="{}" lon="{}">"#,
        coord.latitude, coord.longitude
    ));
    gpx.push('\n');
    if let Some(name) = name {
        gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(name)));
    }
    gpx.push_str(&format!("    <time>{}</time>\n", format_timestamp(time)?));
    gpx.push_str("  </wpt>\n");
    Ok(())
}

fn first_segment(label: &str) -> &str {
    label.split(',').next().unwrap_or(label)
}

fn sanitize_filename(name: &str) -> String {
    name.replace(' ', "_")
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

/// Escapes XML special characters in a string.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
