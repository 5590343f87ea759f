//! Route-to-GPX export core.
//!
//! A [`Session`] owns the start/end selection, the two address search fields
//! and the viewport, and turns a calculated route into GPX for location
//! simulators. External services plug in through the traits in [`providers`].

pub mod config;
pub mod errors;
pub mod geo_math;
pub mod geocode_cache;
pub mod gpx_writer;
pub mod models;
pub mod notifications;
pub mod providers;
pub mod sampling;
pub mod search;
pub mod selection;
pub mod session;

pub use config::{SessionConfig, SpeedBounds};
pub use errors::{GpxCreatorError, ProviderError, ProviderErrorKind};
pub use gpx_writer::GpxExport;
pub use models::{Coordinate, DisplayName, Field, MapRegion, Placemark, RoutePolyline, SearchResult, SelectionMode};
pub use notifications::{Notice, NoticeCode, Severity, Warning};
pub use providers::Providers;
pub use session::{MapClick, Session, SessionSnapshot};
