//! The session controller: one owner for selection, viewport, geocode cache
//! and the two search fields.
//!
//! All mutation goes through [`Session`] methods. State lives behind a
//! `std::sync::Mutex` that is never held across an `.await`; network work
//! runs as tokio futures that re-acquire the lock to publish. When both locks
//! are needed, the session state is locked before the search fields.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::errors::{GpxCreatorError, ProviderError, Result};
use crate::geo_math::{MIN_VIEWPORT_SPAN_DEG, bounding_region, region_around, region_between};
use crate::geocode_cache::GeocodeCache;
use crate::gpx_writer::{
    GpxExport, route_filename, serialize_route_with_limit, serialize_waypoint, waypoint_filename,
    waypoint_label,
};
use crate::models::{Coordinate, Field, MapRegion, RoutePolyline, SearchResult};
use crate::notifications::{Notice, Notifier, Warning};
use crate::providers::{DirectionsProvider, Providers, ReverseGeocoder};
use crate::search::{SearchFieldState, SearchOrchestrator, SearchSettings, TextChange};
use crate::selection::{Collapse, ModeChange, Phase, SelectionState};

struct SessionState {
    selection: SelectionState,
    viewport: MapRegion,
    cache: GeocodeCache,
    is_calculating_route: bool,
}

struct Inner {
    config: SessionConfig,
    state: Mutex<SessionState>,
    search: SearchOrchestrator,
    directions: Arc<dyn DirectionsProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    notifier: Notifier,
}

/// Point-in-time copy of everything a UI renders.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub selection: SelectionState,
    pub viewport: MapRegion,
    pub is_calculating_route: bool,
    pub start_field: SearchFieldState,
    pub end_field: SearchFieldState,
}

/// Outcome of a map click.
#[derive(Debug)]
pub struct MapClick {
    pub field: Field,
    pub coordinate: Coordinate,
    /// Reverse geocode in flight; `None` when the address came from the cache.
    pub geocode: Option<JoinHandle<()>>,
}

/// Cloneable handle; clones drive the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

/// Clears the in-flight flag however the calculation ends.
struct CalculationGuard<'a> {
    session: &'a Session,
}

impl Drop for CalculationGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().is_calculating_route = false;
    }
}

impl Session {
    pub fn new(config: SessionConfig, providers: Providers) -> Self {
        let notifier = Notifier::new(config.error_notice_ttl(), config.warning_notice_ttl());
        let search = SearchOrchestrator::new(
            providers.search,
            SearchSettings {
                debounce: config.search_debounce(),
                max_results: config.max_search_results,
            },
            notifier.clone(),
        );
        let state = SessionState {
            selection: SelectionState::new(config.default_speed_kmh),
            viewport: config.fallback_region,
            cache: GeocodeCache::new(config.geocode_cache_capacity),
            is_calculating_route: false,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
                search,
                directions: providers.directions,
                geocoder: providers.geocoder,
                notifier,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports user-facing failures. `Unavailable` is a disabled action, not
    /// a failure, so it is only logged.
    fn surface(&self, err: &GpxCreatorError) {
        match err {
            GpxCreatorError::Unavailable { .. } => debug!("{err}"),
            _ => self.inner.notifier.report(err),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.inner.notifier.subscribe()
    }

    pub fn active_notices(&self) -> Vec<Notice> {
        self.inner.notifier.active()
    }

    pub fn dismiss_error(&self) {
        self.inner.notifier.dismiss_error();
    }

    pub fn dismiss_warning(&self) {
        self.inner.notifier.dismiss_warning();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            selection: state.selection.clone(),
            viewport: state.viewport,
            is_calculating_route: state.is_calculating_route,
            start_field: self.inner.search.snapshot(Field::Start),
            end_field: self.inner.search.snapshot(Field::End),
        }
    }

    pub fn field_text(&self, field: Field) -> String {
        self.inner.search.query(field)
    }

    /// Programmatic write into an address field; not searched.
    pub fn set_field_text(&self, field: Field, text: impl Into<String>) {
        self.inner.search.set_text(field, text);
    }

    /// True while a debounced search for `field` is waiting or running.
    pub fn is_searching(&self, field: Field) -> bool {
        self.inner.search.has_pending(field)
    }

    /// Places a point where the user clicked.
    ///
    /// The field gets a coordinate placeholder right away. Its address comes
    /// from the geocode cache or from a spawned reverse geocode, so this must
    /// run inside a tokio runtime.
    pub fn handle_map_click(&self, coordinate: Coordinate) -> Result<MapClick> {
        let mut state = self.lock();
        let field = state
            .selection
            .place_point(coordinate)
            .inspect_err(|e| self.surface(e))?;

        state.viewport = match (field, state.selection.start()) {
            (Field::End, Some(start)) => region_between(start, coordinate),
            _ => region_around(coordinate, MIN_VIEWPORT_SPAN_DEG),
        };
        info!(%field, %coordinate, "Point placed");

        if let Some(address) = state.cache.get(coordinate) {
            debug!(%coordinate, "Geocode cache hit");
            self.inner.search.set_text(field, address);
            return Ok(MapClick {
                field,
                coordinate,
                geocode: None,
            });
        }

        self.inner.search.set_text(field, coordinate.placeholder_label());
        drop(state);

        let this = self.clone();
        let geocode = tokio::spawn(async move { this.resolve_address(field, coordinate).await });
        Ok(MapClick {
            field,
            coordinate,
            geocode: Some(geocode),
        })
    }

    async fn resolve_address(&self, field: Field, coordinate: Coordinate) {
        let placemark = match self.inner.geocoder.reverse_geocode(coordinate).await {
            Ok(placemark) => placemark,
            Err(e) => {
                debug!(%coordinate, "Keeping placeholder: {e}");
                return;
            }
        };
        let label = placemark.address_label();

        let mut state = self.lock();
        state.cache.put(coordinate, label.clone());
        // The point may have moved while the lookup ran.
        if state.selection.point(field) == Some(coordinate) {
            self.inner.search.set_text(field, label);
        }
    }

    /// Forwards a text edit from the UI to the field's search. The region
    /// bias is a window around the start point, else the current viewport.
    pub fn text_changed(&self, field: Field, text: &str) -> TextChange {
        let bias = {
            let state = self.lock();
            state
                .selection
                .start()
                .map(|start| region_around(start, self.inner.config.search_bias_span_deg))
                .unwrap_or(state.viewport)
        };
        self.inner.search.text_changed(field, text, Some(bias))
    }

    pub fn search_single(&self, query: &str) -> TextChange {
        self.text_changed(Field::Start, query)
    }

    /// Picks published result `index` for `field`.
    pub fn select_result(&self, field: Field, index: usize) -> Result<Option<SearchResult>> {
        let mut state = self.lock();
        let selection = &mut state.selection;
        let picked = self
            .inner
            .search
            .select_result(field, index, |result| selection.assign(field, result.coordinate))
            .inspect_err(|e| self.surface(e))?;
        let Some(result) = picked else {
            return Ok(None);
        };
        state.viewport = region_around(result.coordinate, MIN_VIEWPORT_SPAN_DEG);
        info!(%field, label = result.label(), "Search result selected");
        Ok(Some(result))
    }

    /// Picks a start-field result and switches to single-field mode.
    pub fn select_single(&self, index: usize) -> Result<Option<SearchResult>> {
        let mut state = self.lock();
        let selection = &mut state.selection;
        let picked = self
            .inner
            .search
            .select_result(Field::Start, index, |result| selection.select_single(result.coordinate))
            .inspect_err(|e| self.surface(e))?;
        let Some(result) = picked else {
            return Ok(None);
        };
        self.inner.search.set_text(Field::End, "");
        state.viewport = region_around(result.coordinate, MIN_VIEWPORT_SPAN_DEG);
        Ok(Some(result))
    }

    /// Switches between one and two address fields. Collapsing to one field
    /// carries the retained point's text into the start field.
    pub fn toggle_mode(&self) -> ModeChange {
        let mut state = self.lock();
        let change = state.selection.toggle_mode();

        if let Some(collapse) = change.collapse {
            if let Collapse::KeptEnd(_) = collapse {
                let end_text = self.inner.search.query(Field::End);
                self.inner.search.set_text(Field::Start, end_text);
            }
            self.inner.search.set_text(Field::End, "");
            if let Some(retained) = collapse.retained() {
                state.viewport = region_around(retained, MIN_VIEWPORT_SPAN_DEG);
            }
        }
        self.inner.search.clear_results(None);

        info!(mode = ?change.mode, "Mode toggled");
        change
    }

    /// Drops both points, the route and all search state.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.selection.clear();
        self.inner.search.reset();
        info!("Selection cleared");
    }

    /// Starts over so the next map click sets a new start point.
    pub fn pick_point(&self) {
        self.clear();
    }

    /// Clamps to the allowed range, rounds to the nearest 10 km/h and stores
    /// the result. Warns when the requested value was out of range.
    pub fn update_simulation_speed(&self, speed_kmh: f64) -> f64 {
        let bounds = self.inner.config.speed_bounds;
        let mut state = self.lock();
        let current = state.selection.simulation_speed_kmh();
        if !speed_kmh.is_finite() {
            return current;
        }

        let adjusted = bounds.clamp_and_round(speed_kmh);
        if adjusted != current {
            state.selection.set_simulation_speed(adjusted);
            debug!(speed_kmh = adjusted, "Simulation speed updated");
        }
        drop(state);

        if !bounds.contains(speed_kmh) {
            self.inner.notifier.warn(Warning::SimulationSpeedAdjusted);
        }
        adjusted
    }

    /// Stores the speed unchecked. Actions validate it before use.
    pub fn set_simulation_speed(&self, speed_kmh: f64) {
        self.lock().selection.set_simulation_speed(speed_kmh);
    }

    fn validate_for_action(&self, selection: &SelectionState, action: &'static str) -> Result<()> {
        let start_text = self.inner.search.query(Field::Start);
        let end_text = self.inner.search.query(Field::End);
        selection.validate_for_action(action, self.inner.config.speed_bounds, &start_text, &end_text)
    }

    /// Requests a driving route between the selected points.
    ///
    /// Only one calculation runs at a time. On success the route is stored
    /// and the viewport fitted to it. Failures leave the selection untouched.
    pub async fn calculate_route(&self) -> Result<RoutePolyline> {
        self.try_calculate_route()
            .await
            .inspect_err(|e| self.surface(e))
    }

    async fn try_calculate_route(&self) -> Result<RoutePolyline> {
        let (start, end) = {
            let mut state = self.lock();
            let (Some(start), Some(end)) = (state.selection.start(), state.selection.end()) else {
                return Err(GpxCreatorError::Unavailable {
                    action: "Route calculation",
                    reason: "select both start and end points",
                });
            };
            if state.is_calculating_route {
                return Err(GpxCreatorError::Unavailable {
                    action: "Route calculation",
                    reason: "a calculation is already running",
                });
            }
            self.validate_for_action(&state.selection, "calculating a route")?;
            state.is_calculating_route = true;
            (start, end)
        };
        let _guard = CalculationGuard { session: self };

        info!(%start, %end, "Calculating route");
        let route = self.inner.directions.calculate_route(start, end).await?;
        if route.is_empty() {
            return Err(ProviderError::route("No route found").into());
        }

        let mut state = self.lock();
        if state.selection.start() != Some(start) || state.selection.end() != Some(end) {
            warn!("Endpoints changed during calculation, discarding route");
            return Err(GpxCreatorError::Unavailable {
                action: "Storing the route",
                reason: "the endpoints changed during calculation",
            });
        }
        state.selection.set_route(route.clone())?;
        if let Some(region) = bounding_region(route.points()) {
            state.viewport = region;
        }
        info!(points = route.len(), "Route calculated");
        Ok(route)
    }

    pub fn export_route(&self) -> Result<GpxExport> {
        self.export_route_at(OffsetDateTime::now_utc())
    }

    /// Route GPX with timestamps starting at `now`.
    pub fn export_route_at(&self, now: OffsetDateTime) -> Result<GpxExport> {
        let state = self.lock();
        let Some(route) = state.selection.route() else {
            self.inner.notifier.warn(Warning::NoRouteCalculated);
            return Err(GpxCreatorError::Unavailable {
                action: "Route export",
                reason: "no route has been calculated",
            });
        };
        self.validate_for_action(&state.selection, "exporting")
            .inspect_err(|e| self.surface(e))?;

        let start_text = self.inner.search.query(Field::Start);
        let end_text = self.inner.search.query(Field::End);
        let content = serialize_route_with_limit(
            route.points(),
            self.inner.config.max_export_points,
            state.selection.simulation_speed_kmh(),
            &start_text,
            &end_text,
            now,
        )
        .inspect_err(|e| self.surface(e))?;

        let suggested_filename = route_filename(&start_text, &end_text);
        info!(file = %suggested_filename, "Route exported");
        Ok(GpxExport {
            content,
            suggested_filename,
        })
    }

    pub fn export_waypoint(&self) -> Result<GpxExport> {
        self.export_waypoint_at(OffsetDateTime::now_utc())
    }

    /// Single-waypoint GPX for the end point if set, else the start point.
    pub fn export_waypoint_at(&self, now: OffsetDateTime) -> Result<GpxExport> {
        let state = self.lock();
        let Some(target) = state.selection.waypoint_target() else {
            self.inner.notifier.warn(Warning::NoLocationSelected);
            return Err(GpxCreatorError::Unavailable {
                action: "Waypoint export",
                reason: "no location is selected",
            });
        };
        self.validate_for_action(&state.selection, "exporting")
            .inspect_err(|e| self.surface(e))?;

        // The label follows the exported point.
        let start_text = self.inner.search.query(Field::Start);
        let end_text = match state.selection.end() {
            Some(_) => self.inner.search.query(Field::End),
            None => String::new(),
        };
        let label = waypoint_label(&end_text, &start_text);

        let content = serialize_waypoint(target, label, now).inspect_err(|e| self.surface(e))?;
        let suggested_filename = waypoint_filename(label);
        info!(file = %suggested_filename, "Waypoint exported");
        Ok(GpxExport {
            content,
            suggested_filename,
        })
    }

    /// Device location fix. Moves the map only while nothing is selected.
    pub fn handle_location_update(&self, coordinate: Coordinate) {
        if !coordinate.is_valid() {
            debug!(%coordinate, "Ignoring invalid location fix");
            return;
        }
        let mut state = self.lock();
        if state.selection.phase() == Phase::Empty {
            state.viewport = region_around(coordinate, MIN_VIEWPORT_SPAN_DEG);
        }
    }

    pub fn set_viewport(&self, region: MapRegion) {
        self.lock().viewport = region;
    }

    pub fn viewport(&self) -> MapRegion {
        self.lock().viewport
    }

    /// Fits the viewport to the current route, if any.
    pub fn fit_to_route(&self) -> bool {
        let mut state = self.lock();
        let fitted = state.selection.route().and_then(|r| bounding_region(r.points()));
        match fitted {
            Some(region) => {
                state.viewport = region;
                true
            }
            None => false,
        }
    }

    pub fn can_calculate_route(&self) -> bool {
        let state = self.lock();
        state.selection.can_calculate_route(state.is_calculating_route)
    }

    pub fn can_export_route(&self) -> bool {
        self.lock().selection.can_export_route()
    }

    pub fn can_export_waypoint(&self) -> bool {
        self.lock().selection.can_export_waypoint()
    }
}
