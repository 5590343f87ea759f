//! Start/end selection, field mode and route validity.
//!
//! `SelectionState` enforces its invariants on every transition:
//! - a route is only held while both start and end are set
//! - single-field mode holds at most one point, in the start slot
//! - changing either endpoint drops the route

use tracing::debug;

use crate::config::SpeedBounds;
use crate::errors::GpxCreatorError;
use crate::models::{Coordinate, Field, RoutePolyline, SelectionMode};

/// How many points are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    /// Exactly one point is selected.
    StartSet,
    BothSet,
}

/// What switching to single-field mode kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collapse {
    /// Nothing was selected.
    Nothing,
    /// The end point moved into the start slot; the old start was dropped.
    KeptEnd(Coordinate),
    /// Only the start point was selected and it stays.
    KeptStart(Coordinate),
}

impl Collapse {
    pub fn retained(self) -> Option<Coordinate> {
        match self {
            Collapse::Nothing => None,
            Collapse::KeptEnd(c) | Collapse::KeptStart(c) => Some(c),
        }
    }
}

/// Result of [`SelectionState::toggle_mode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeChange {
    pub mode: SelectionMode,
    /// Present only when the toggle went from two fields to one.
    pub collapse: Option<Collapse>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    start: Option<Coordinate>,
    end: Option<Coordinate>,
    mode: SelectionMode,
    route: Option<RoutePolyline>,
    simulation_speed_kmh: f64,
}

impl SelectionState {
    pub fn new(simulation_speed_kmh: f64) -> Self {
        Self {
            start: None,
            end: None,
            mode: SelectionMode::Single,
            route: None,
            simulation_speed_kmh,
        }
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.start
    }

    pub fn end(&self) -> Option<Coordinate> {
        self.end
    }

    pub fn point(&self, field: Field) -> Option<Coordinate> {
        match field {
            Field::Start => self.start,
            Field::End => self.end,
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn route(&self) -> Option<&RoutePolyline> {
        self.route.as_ref()
    }

    pub fn simulation_speed_kmh(&self) -> f64 {
        self.simulation_speed_kmh
    }

    pub fn phase(&self) -> Phase {
        match (self.start, self.end) {
            (None, None) => Phase::Empty,
            (Some(_), Some(_)) => Phase::BothSet,
            _ => Phase::StartSet,
        }
    }

    /// Sets the start point. Valid while no start is selected.
    pub fn set_start(&mut self, coordinate: Coordinate) -> Result<(), GpxCreatorError> {
        let coordinate = coordinate.validate()?;
        if self.start.is_some() {
            return Err(GpxCreatorError::Unavailable {
                action: "Setting the start point",
                reason: "a start point is already selected",
            });
        }
        self.start = Some(coordinate);
        debug!(%coordinate, "Start set");
        Ok(())
    }

    /// Sets the end point once a start exists, switching to two fields.
    pub fn set_end(&mut self, coordinate: Coordinate) -> Result<(), GpxCreatorError> {
        let coordinate = coordinate.validate()?;
        if self.start.is_none() || self.end.is_some() {
            return Err(GpxCreatorError::Unavailable {
                action: "Setting the end point",
                reason: "it requires a start point and no end point",
            });
        }
        self.end = Some(coordinate);
        self.mode = SelectionMode::Two;
        self.route = None;
        debug!(%coordinate, "End set");
        Ok(())
    }

    /// Replaces the end point when both are set. Invalidates the route.
    pub fn replace_end(&mut self, coordinate: Coordinate) -> Result<(), GpxCreatorError> {
        let coordinate = coordinate.validate()?;
        if self.phase() != Phase::BothSet {
            return Err(GpxCreatorError::Unavailable {
                action: "Replacing the end point",
                reason: "both points must already be selected",
            });
        }
        self.end = Some(coordinate);
        self.route = None;
        debug!(%coordinate, "End replaced");
        Ok(())
    }

    /// Map-click dispatch: fills start, then end, then keeps replacing end.
    pub fn place_point(&mut self, coordinate: Coordinate) -> Result<Field, GpxCreatorError> {
        if self.start.is_none() {
            self.set_start(coordinate).map(|_| Field::Start)
        } else if self.end.is_none() {
            self.set_end(coordinate).map(|_| Field::End)
        } else {
            self.replace_end(coordinate).map(|_| Field::End)
        }
    }

    /// Assigns a point picked from search results, then applies the mode rule:
    /// both set selects two fields, start alone selects one.
    pub fn assign(&mut self, field: Field, coordinate: Coordinate) -> Result<(), GpxCreatorError> {
        let coordinate = coordinate.validate()?;
        match field {
            Field::Start => self.start = Some(coordinate),
            Field::End => self.end = Some(coordinate),
        }
        self.route = None;

        match (self.start, self.end) {
            (Some(_), Some(_)) => self.mode = SelectionMode::Two,
            (Some(_), None) => self.mode = SelectionMode::Single,
            _ => {}
        }
        Ok(())
    }

    /// Single-field pick: the point becomes the only selection.
    pub fn select_single(&mut self, coordinate: Coordinate) -> Result<(), GpxCreatorError> {
        let coordinate = coordinate.validate()?;
        self.start = Some(coordinate);
        self.end = None;
        self.route = None;
        self.mode = SelectionMode::Single;
        Ok(())
    }

    /// Flips the field mode. Leaving two-field mode keeps the end point if
    /// there is one (moved into the start slot), otherwise the start point,
    /// and always drops the route.
    pub fn toggle_mode(&mut self) -> ModeChange {
        self.mode = self.mode.toggled();
        if self.mode == SelectionMode::Two {
            return ModeChange {
                mode: self.mode,
                collapse: None,
            };
        }

        let collapse = match (self.start, self.end) {
            (_, Some(end)) => {
                self.start = Some(end);
                self.end = None;
                Collapse::KeptEnd(end)
            }
            (Some(start), None) => Collapse::KeptStart(start),
            (None, None) => Collapse::Nothing,
        };
        self.route = None;
        debug!(?collapse, "Collapsed to single field");

        ModeChange {
            mode: self.mode,
            collapse: Some(collapse),
        }
    }

    /// Back to nothing selected in single-field mode. Speed is kept.
    pub fn clear(&mut self) {
        self.start = None;
        self.end = None;
        self.route = None;
        self.mode = SelectionMode::Single;
    }

    /// Installs a calculated route. Requires both points.
    pub fn set_route(&mut self, route: RoutePolyline) -> Result<(), GpxCreatorError> {
        if self.phase() != Phase::BothSet {
            return Err(GpxCreatorError::Unavailable {
                action: "Storing the route",
                reason: "both points must be selected",
            });
        }
        self.route = Some(route);
        self.mode = SelectionMode::Two;
        Ok(())
    }

    pub fn set_simulation_speed(&mut self, speed_kmh: f64) {
        self.simulation_speed_kmh = speed_kmh;
    }

    pub fn can_calculate_route(&self, calculating: bool) -> bool {
        self.phase() == Phase::BothSet && !calculating
    }

    pub fn can_export_route(&self) -> bool {
        self.route.is_some()
    }

    pub fn can_export_waypoint(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// End if present, else start.
    pub fn waypoint_target(&self) -> Option<Coordinate> {
        self.end.or(self.start)
    }

    /// Guard shared by route calculation and both exports.
    ///
    /// The speed must be within `bounds`. The start text must be non-blank,
    /// and in two-field mode the end text as well.
    pub fn validate_for_action(
        &self,
        action: &'static str,
        bounds: SpeedBounds,
        start_text: &str,
        end_text: &str,
    ) -> Result<(), GpxCreatorError> {
        if !bounds.contains(self.simulation_speed_kmh) {
            return Err(GpxCreatorError::InvalidSpeed {
                speed: self.simulation_speed_kmh,
                min: bounds.min_kmh,
                max: bounds.max_kmh,
            });
        }

        let end_required = self.mode == SelectionMode::Two;
        if start_text.trim().is_empty() || (end_required && end_text.trim().is_empty()) {
            return Err(GpxCreatorError::MissingAddress { action });
        }
        Ok(())
    }
}
