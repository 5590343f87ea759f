//! Interfaces to the external search, directions and reverse-geocode services.
//!
//! - [`SearchProvider`]: free-text place search with an optional region bias
//! - [`DirectionsProvider`]: driving route between two points
//! - [`ReverseGeocoder`]: address components for a coordinate
//! - [`OsmClient`]: implementation of all three backed by Nominatim and OSRM

mod osm;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::{Coordinate, MapRegion, Placemark, RoutePolyline, SearchResult};

pub use osm::{OsmClient, OsmConfig, OsmError};

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Results in provider order. `region` is a bias hint, not a filter.
    async fn search(
        &self,
        query: &str,
        region: Option<MapRegion>,
    ) -> Result<Vec<SearchResult>, ProviderError>;
}

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn calculate_route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RoutePolyline, ProviderError>;
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Placemark, ProviderError>;
}

/// The collaborators a session talks to.
#[derive(Clone)]
pub struct Providers {
    pub search: Arc<dyn SearchProvider>,
    pub directions: Arc<dyn DirectionsProvider>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
}

impl Providers {
    /// Uses one value for all three roles.
    pub fn from_shared<P>(provider: Arc<P>) -> Self
    where
        P: SearchProvider + DirectionsProvider + ReverseGeocoder + 'static,
    {
        Self {
            search: provider.clone(),
            directions: provider.clone(),
            geocoder: provider,
        }
    }
}
