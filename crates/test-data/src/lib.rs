//! Fixtures for exercising gpx-creator without network access.
//!
//! - synthetic route polylines of a chosen length and density
//! - scripted search, directions and reverse-geocode providers
//! - read-back of exported GPX through the `gpx` crate
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let route = RouteGenerator::new()
//!     .with_points(3000)
//!     .with_length(80_000.0)
//!     .generate(Place::SAN_FRANCISCO, Place::SAN_JOSE, &mut rng);
//!
//! let services = ScriptedServices::new().with_route(route);
//! let session = Session::new(SessionConfig::default(), services.providers());
//! ```

pub mod config;
pub mod providers;
pub mod sources;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{BoundingBox, BoundingBoxExt, Place, Region};
    pub use crate::providers::{
        ScriptedDirections, ScriptedGeocoder, ScriptedSearch, ScriptedServices,
    };
    pub use crate::sources::{ExportedGpx, ExportedWaypoint, GpxReadError, GpxReader, RouteGenerator};
    pub use gpx_creator::{Coordinate, Field, Session, SessionConfig};
    pub use rand::SeedableRng;
    pub use rand::rngs::StdRng;
}
