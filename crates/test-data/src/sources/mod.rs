//! Fixture sources.
//!
//! - [`RouteGenerator`]: synthetic route polylines with uneven vertex density
//! - [`GpxReader`]: parses exported GPX back into coordinates and timestamps

mod gpx_files;
mod procedural;

pub use gpx_files::{ExportedGpx, ExportedWaypoint, GpxReadError, GpxReader};
pub use procedural::{RouteConfig, RouteGenerator};
