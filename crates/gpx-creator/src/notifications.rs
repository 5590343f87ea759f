//! User-facing notices with auto-expiry.
//!
//! Every notice is broadcast to subscribers as it is raised. The most recent
//! error and the most recent warning are also retained until they expire or
//! are dismissed, for UIs that poll instead of subscribing.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::errors::{GpxCreatorError, ProviderErrorKind};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeCode {
    InvalidCoordinate,
    InvalidSpeed,
    MissingAddress,
    SearchFailed,
    RouteCalculationFailed,
    GeocodeFailed,
    FileWriteFailed,
    ResultsTruncated,
    NoRouteCalculated,
    NoLocationSelected,
    SimulationSpeedAdjusted,
    ActionUnavailable,
    Internal,
}

/// Non-blocking advisories shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    NoRouteCalculated,
    NoLocationSelected,
    SimulationSpeedAdjusted,
    SearchResultsLimited,
}

impl Warning {
    pub fn message(self) -> &'static str {
        match self {
            Warning::NoRouteCalculated => {
                "No route calculated yet. Select start and end points first."
            }
            Warning::NoLocationSelected => {
                "No location selected. Click on the map or search for a location."
            }
            Warning::SimulationSpeedAdjusted => {
                "Simulation speed adjusted to recommended range (20-100 km/h)."
            }
            Warning::SearchResultsLimited => {
                "Showing first 5 search results. Refine your search for more specific results."
            }
        }
    }

    fn code(self) -> NoticeCode {
        match self {
            Warning::NoRouteCalculated => NoticeCode::NoRouteCalculated,
            Warning::NoLocationSelected => NoticeCode::NoLocationSelected,
            Warning::SimulationSpeedAdjusted => NoticeCode::SimulationSpeedAdjusted,
            Warning::SearchResultsLimited => NoticeCode::ResultsTruncated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub code: NoticeCode,
    pub message: String,
}

impl From<Warning> for Notice {
    fn from(warning: Warning) -> Self {
        Notice {
            severity: Severity::Warning,
            code: warning.code(),
            message: warning.message().to_string(),
        }
    }
}

impl From<&GpxCreatorError> for Notice {
    fn from(err: &GpxCreatorError) -> Self {
        let (severity, code) = match err {
            GpxCreatorError::InvalidCoordinate { .. } => (Severity::Error, NoticeCode::InvalidCoordinate),
            GpxCreatorError::InvalidSpeed { .. } => (Severity::Warning, NoticeCode::InvalidSpeed),
            GpxCreatorError::MissingAddress { .. } => (Severity::Warning, NoticeCode::MissingAddress),
            GpxCreatorError::Unavailable { .. } => (Severity::Warning, NoticeCode::ActionUnavailable),
            GpxCreatorError::Provider(e) => (
                Severity::Error,
                match e.kind {
                    ProviderErrorKind::SearchFailed => NoticeCode::SearchFailed,
                    ProviderErrorKind::RouteCalculationFailed => NoticeCode::RouteCalculationFailed,
                    ProviderErrorKind::GeocodeFailed => NoticeCode::GeocodeFailed,
                },
            ),
            GpxCreatorError::FileWriteFailed(_) => (Severity::Error, NoticeCode::FileWriteFailed),
            GpxCreatorError::TimeFormat(_) => (Severity::Error, NoticeCode::Internal),
        };
        Notice {
            severity,
            code,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Posted {
    notice: Notice,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Latest {
    error: Option<Posted>,
    warning: Option<Posted>,
}

/// Cloneable handle for raising and observing notices.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
    latest: Arc<Mutex<Latest>>,
    error_ttl: Duration,
    warning_ttl: Duration,
}

impl Notifier {
    pub fn new(error_ttl: Duration, warning_ttl: Duration) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            latest: Arc::new(Mutex::new(Latest::default())),
            error_ttl,
            warning_ttl,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn warn(&self, warning: Warning) {
        self.post(Notice::from(warning));
    }

    pub fn report(&self, err: &GpxCreatorError) {
        self.post(Notice::from(err));
    }

    pub fn post(&self, notice: Notice) {
        match notice.severity {
            Severity::Error => warn!("{}", notice.message),
            Severity::Warning => info!("{}", notice.message),
        }

        let ttl = match notice.severity {
            Severity::Error => self.error_ttl,
            Severity::Warning => self.warning_ttl,
        };
        let posted = Posted {
            notice: notice.clone(),
            expires_at: Instant::now() + ttl,
        };
        {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            match notice.severity {
                Severity::Error => latest.error = Some(posted),
                Severity::Warning => latest.warning = Some(posted),
            }
        }

        // No subscribers is fine; the latest slots still hold the notice.
        let _ = self.tx.send(notice);
    }

    /// Unexpired retained notices, error first.
    pub fn active(&self) -> Vec<Notice> {
        let now = Instant::now();
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        [&latest.error, &latest.warning]
            .into_iter()
            .flatten()
            .filter(|posted| posted.expires_at > now)
            .map(|posted| posted.notice.clone())
            .collect()
    }

    pub fn dismiss_error(&self) {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).error = None;
    }

    pub fn dismiss_warning(&self) {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).warning = None;
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(4), Duration::from_secs(3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;

    #[tokio::test(start_paused = true)]
    async fn test_notices_expire() {
        let notifier = Notifier::default();
        notifier.report(&ProviderError::search("offline").into());
        notifier.warn(Warning::SearchResultsLimited);
        assert_eq!(notifier.active().len(), 2);

        tokio::time::sleep(Duration::from_millis(3100)).await;
        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, NoticeCode::SearchFailed);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(notifier.active().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_receive_notices() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.warn(Warning::NoRouteCalculated);
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.severity, Severity::Warning);
        assert_eq!(notice.code, NoticeCode::NoRouteCalculated);
    }

    #[tokio::test]
    async fn test_dismiss() {
        let notifier = Notifier::default();
        notifier.warn(Warning::NoLocationSelected);
        notifier.dismiss_warning();
        assert!(notifier.active().is_empty());
    }

    #[test]
    fn test_error_mapping() {
        let notice = Notice::from(&GpxCreatorError::MissingAddress { action: "export" });
        assert_eq!(notice.severity, Severity::Warning);
        assert_eq!(notice.code, NoticeCode::MissingAddress);

        let notice = Notice::from(&GpxCreatorError::InvalidSpeed {
            speed: 150.0,
            min: 20.0,
            max: 100.0,
        });
        assert_eq!(notice.severity, Severity::Warning);
        assert_eq!(notice.code, NoticeCode::InvalidSpeed);

        let notice = Notice::from(&GpxCreatorError::Unavailable {
            action: "Route calculation",
            reason: "a calculation is already running",
        });
        assert_eq!(notice.code, NoticeCode::ActionUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_notice_uses_warning_lifetime() {
        let notifier = Notifier::default();
        notifier.report(&GpxCreatorError::InvalidSpeed {
            speed: 5.0,
            min: 20.0,
            max: 100.0,
        });

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(notifier.active().len(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(notifier.active().is_empty());
    }
}
