//! Scripted in-memory providers.
//!
//! Each provider answers from canned data, records how it was called and can
//! be told to fail or to take a while, so session behavior can be driven
//! deterministically under tokio's paused clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use gpx_creator::models::CoordinateKey;
use gpx_creator::providers::{DirectionsProvider, ReverseGeocoder, SearchProvider};
use gpx_creator::{
    Coordinate, MapRegion, Placemark, ProviderError, Providers, RoutePolyline, SearchResult,
};
use tracing::debug;

/// Search answering from a query → results table. Unknown queries return no
/// results.
#[derive(Default)]
pub struct ScriptedSearch {
    results: HashMap<String, Vec<SearchResult>>,
    failure: Option<String>,
    delay: Duration,
    calls: Mutex<Vec<(String, Option<MapRegion>)>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        self.results.insert(query.into(), results);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Queries received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }

    /// Region hint passed with the most recent query.
    pub fn last_region(&self) -> Option<MapRegion> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .and_then(|(_, region)| *region)
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(
        &self,
        query: &str,
        region: Option<MapRegion>,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.to_string(), region));
        debug!(query, "Scripted search");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ProviderError::search(message.clone()));
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

/// Directions returning one fixed route for any request.
#[derive(Default)]
pub struct ScriptedDirections {
    route: Option<RoutePolyline>,
    failure: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedDirections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(route: RoutePolyline) -> Self {
        Self {
            route: Some(route),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectionsProvider for ScriptedDirections {
    async fn calculate_route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RoutePolyline, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(%start, %end, "Scripted directions");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ProviderError::route(message.clone()));
        }
        // Without a scripted route, drive straight there.
        Ok(self
            .route
            .clone()
            .unwrap_or_else(|| vec![start, end].into()))
    }
}

/// Reverse geocoder answering from a coordinate → placemark table. Unknown
/// coordinates fail, which leaves the session's placeholder in place.
#[derive(Default)]
pub struct ScriptedGeocoder {
    places: HashMap<CoordinateKey, Placemark>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, coordinate: Coordinate, placemark: Placemark) -> Self {
        self.places.insert(coordinate.key(), placemark);
        self
    }

    /// Shorthand for a placemark with only a name.
    pub fn with_name(self, coordinate: Coordinate, name: impl Into<String>) -> Self {
        self.with_place(
            coordinate,
            Placemark {
                name: Some(name.into()),
                ..Default::default()
            },
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for ScriptedGeocoder {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Placemark, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.places
            .get(&coordinate.key())
            .cloned()
            .ok_or_else(|| ProviderError::geocode(format!("No address for {coordinate}")))
    }
}

/// The three scripted providers, kept reachable for assertions after they
/// are handed to a session.
#[derive(Clone)]
pub struct ScriptedServices {
    pub search: Arc<ScriptedSearch>,
    pub directions: Arc<ScriptedDirections>,
    pub geocoder: Arc<ScriptedGeocoder>,
}

impl ScriptedServices {
    pub fn new() -> Self {
        Self {
            search: Arc::new(ScriptedSearch::new()),
            directions: Arc::new(ScriptedDirections::new()),
            geocoder: Arc::new(ScriptedGeocoder::new()),
        }
    }

    pub fn with_search(mut self, search: ScriptedSearch) -> Self {
        self.search = Arc::new(search);
        self
    }

    pub fn with_directions(mut self, directions: ScriptedDirections) -> Self {
        self.directions = Arc::new(directions);
        self
    }

    pub fn with_route(self, route: RoutePolyline) -> Self {
        self.with_directions(ScriptedDirections::returning(route))
    }

    pub fn with_geocoder(mut self, geocoder: ScriptedGeocoder) -> Self {
        self.geocoder = Arc::new(geocoder);
        self
    }

    pub fn providers(&self) -> Providers {
        Providers {
            search: self.search.clone(),
            directions: self.directions.clone(),
            geocoder: self.geocoder.clone(),
        }
    }
}

impl Default for ScriptedServices {
    fn default() -> Self {
        Self::new()
    }
}
