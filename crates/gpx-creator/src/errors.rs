use std::fmt;

use thiserror::Error;

/// Which external collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    SearchFailed,
    RouteCalculationFailed,
    GeocodeFailed,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderErrorKind::SearchFailed => "Location search failed",
            ProviderErrorKind::RouteCalculationFailed => "Route calculation failed",
            ProviderErrorKind::GeocodeFailed => "Address lookup failed",
        };
        f.write_str(label)
    }
}

/// Failure reported by a search, directions or reverse-geocode provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn search(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::SearchFailed, message)
    }

    pub fn route(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RouteCalculationFailed, message)
    }

    pub fn geocode(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::GeocodeFailed, message)
    }
}

#[derive(Error, Debug)]
pub enum GpxCreatorError {
    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Simulation speed must be between {min} and {max} km/h, got {speed}")]
    InvalidSpeed { speed: f64, min: f64, max: f64 },

    #[error("Both address fields must be filled in before {action}")]
    MissingAddress { action: &'static str },

    #[error("{action} is not available: {reason}")]
    Unavailable {
        action: &'static str,
        reason: &'static str,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to save file: {0}")]
    FileWriteFailed(#[from] std::io::Error),

    #[error("Timestamp formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),
}

impl GpxCreatorError {
    /// Speed violation for serializers, which only require a positive speed.
    pub(crate) fn non_positive_speed(speed: f64) -> Self {
        GpxCreatorError::InvalidSpeed {
            speed,
            min: 0.0,
            max: f64::INFINITY,
        }
    }

    /// Speed so low that the route's timestamps overflow.
    pub(crate) fn speed_too_slow(speed: f64) -> Self {
        GpxCreatorError::InvalidSpeed {
            speed,
            min: f64::MIN_POSITIVE,
            max: f64::INFINITY,
        }
    }

    /// True for failures caused by incomplete user input rather than a fault.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            GpxCreatorError::InvalidCoordinate { .. }
                | GpxCreatorError::InvalidSpeed { .. }
                | GpxCreatorError::MissingAddress { .. }
                | GpxCreatorError::Unavailable { .. }
        )
    }
}

pub type Result<T, E = GpxCreatorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::route("No route found");
        assert_eq!(err.to_string(), "Route calculation failed: No route found");

        let wrapped: GpxCreatorError = err.into();
        assert_eq!(
            wrapped.to_string(),
            "Route calculation failed: No route found"
        );
        assert!(!wrapped.is_user_input());
    }

    #[test]
    fn test_user_input_classification() {
        let err = GpxCreatorError::InvalidSpeed {
            speed: 150.0,
            min: 20.0,
            max: 100.0,
        };
        assert!(err.is_user_input());
        assert!(err.to_string().contains("150"));
    }
}
