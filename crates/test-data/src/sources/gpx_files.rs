//! Reading exported GPX back for assertions.

use std::path::Path;

use gpx::{Gpx, read};
use gpx_creator::Coordinate;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum GpxReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GPX parse error: {0}")]
    Parse(#[from] gpx::errors::GpxError),
    #[error("No waypoints found in GPX file")]
    NoWaypoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedWaypoint {
    pub coordinate: Coordinate,
    pub name: Option<String>,
    pub time: Option<OffsetDateTime>,
}

/// The parts of an exported document the exporter controls.
#[derive(Debug, Clone)]
pub struct ExportedGpx {
    pub name: Option<String>,
    pub time: Option<OffsetDateTime>,
    pub creator: Option<String>,
    pub waypoints: Vec<ExportedWaypoint>,
    pub track_count: usize,
}

impl ExportedGpx {
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.waypoints.iter().map(|w| w.coordinate).collect()
    }

    /// Seconds between the first and last waypoint timestamps.
    pub fn elapsed_seconds(&self) -> Option<i64> {
        let first = self.waypoints.first()?.time?;
        let last = self.waypoints.last()?.time?;
        Some((last - first).whole_seconds())
    }
}

/// Parses GPX produced by the exporter.
pub struct GpxReader;

impl GpxReader {
    pub fn load_file(path: impl AsRef<Path>) -> Result<ExportedGpx, GpxReadError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Self::extract(read(reader)?)
    }

    pub fn parse_str(content: &str) -> Result<ExportedGpx, GpxReadError> {
        let reader = std::io::Cursor::new(content.as_bytes());
        Self::extract(read(reader)?)
    }

    fn extract(gpx: Gpx) -> Result<ExportedGpx, GpxReadError> {
        if gpx.waypoints.is_empty() {
            return Err(GpxReadError::NoWaypoints);
        }

        let waypoints = gpx
            .waypoints
            .iter()
            .map(|waypoint| {
                let point = waypoint.point();
                ExportedWaypoint {
                    coordinate: Coordinate::new(point.y(), point.x()),
                    name: waypoint.name.clone(),
                    // gpx::Time wraps time::OffsetDateTime and implements From
                    time: waypoint.time.map(OffsetDateTime::from),
                }
            })
            .collect();

        let (name, time) = match gpx.metadata {
            Some(metadata) => (metadata.name, metadata.time.map(OffsetDateTime::from)),
            None => (None, None),
        };

        Ok(ExportedGpx {
            name,
            time,
            creator: gpx.creator,
            waypoints,
            track_count: gpx.tracks.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpx_creator::gpx_writer::serialize_waypoint;
    use time::macros::datetime;

    #[test]
    fn test_parse_waypoint_export() {
        let coordinate = Coordinate::new(37.7955, -122.3937);
        let xml = serialize_waypoint(coordinate, "Ferry Building & Pier", datetime!(2024-05-01 08:30:15.9 UTC))
            .unwrap();

        let parsed = GpxReader::parse_str(&xml).unwrap();
        assert_eq!(parsed.creator.as_deref(), Some("GPX Creator"));
        assert_eq!(parsed.track_count, 0);
        assert_eq!(parsed.waypoints.len(), 1);

        let waypoint = &parsed.waypoints[0];
        assert_eq!(waypoint.coordinate, coordinate);
        assert_eq!(waypoint.name.as_deref(), Some("Ferry Building & Pier"));
        assert_eq!(waypoint.time, Some(datetime!(2024-05-01 08:30:15 UTC)));
    }

    #[test]
    fn test_empty_document() {
        let xml = r#"<?xml version="1.0"?><gpx version="1.1" creator="x" xmlns="http://www.topografix.com/GPX/1/1"></gpx>"#;
        assert!(matches!(GpxReader::parse_str(xml), Err(GpxReadError::NoWaypoints)));
    }
}
