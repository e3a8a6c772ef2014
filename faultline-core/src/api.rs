use std::sync::Arc;
use std::time::Duration;

use crate::protocol::{CaptureEvent, DeployRecord, Level, ReportId, TelemetryEvent};
use crate::{current_client, DeployError, DeployInfo};

/// Captures an event on the currently bound client, if any.
///
/// The event must already be assembled. Typically code would instead use
/// the utility functions like [`capture_message`] or [`capture_error`].
/// The return value is the id of the staged report, or `None` when the
/// capture was dropped.
///
/// # Example
///
/// ```
/// # use faultline_core as faultline;
/// use faultline::protocol::{CaptureEvent, CaptureKind};
///
/// faultline::capture_event(CaptureEvent::new(
///     CaptureKind::ApplicationError,
///     "lost connection to the primary database",
/// ));
/// ```
pub fn capture_event(event: CaptureEvent) -> Option<ReportId> {
    current_client().and_then(|client| client.capture_event(event))
}

/// Captures an arbitrary message at the given severity.
///
/// # Example
///
/// ```
/// # use faultline_core as faultline;
/// use faultline::protocol::Level;
///
/// faultline::capture_message("queue depth above threshold", Level::Warning);
/// ```
pub fn capture_message(message: &str, level: Level) -> Option<ReportId> {
    current_client().and_then(|client| client.capture_message(message, level))
}

/// Captures an error with its full source chain.
///
/// # Example
///
/// ```
/// # use faultline_core as faultline;
/// let result = "not a number".parse::<u32>();
/// if let Err(err) = result {
///     faultline::capture_error(&err);
/// }
/// ```
pub fn capture_error<E: std::error::Error + ?Sized>(error: &E) -> Option<ReportId> {
    current_client().and_then(|client| client.capture_error(error))
}

/// Returns the id of the last report staged on the bound client.
///
/// # Example
///
/// ```
/// # use faultline_core as faultline;
/// use faultline::protocol::Level;
///
/// let id = faultline::capture_message("authorization expired", Level::Error);
/// assert_eq!(faultline::last_report_id(), id);
/// ```
pub fn last_report_id() -> Option<ReportId> {
    current_client().and_then(|client| client.last_report_id())
}

/// Appends an event to the telemetry timeline of the bound client.
///
/// The timeline is bounded by `max_telemetry_events`; a snapshot of it
/// rides along on every subsequent report.
///
/// # Example
///
/// ```
/// # use faultline_core as faultline;
/// use faultline::protocol::TelemetryEvent;
///
/// faultline::record_telemetry(TelemetryEvent::navigation("login", "dashboard"));
/// ```
pub fn record_telemetry(event: TelemetryEvent) {
    if let Some(client) = current_client() {
        client.record_telemetry(event);
    }
}

/// Registers a deploy on the bound client, making it the current one for
/// future reports.
///
/// Without a bound client there is no credential to register under, so
/// this fails with [`DeployError::MissingCredential`].
pub fn register_deploy(info: DeployInfo) -> Result<Arc<DeployRecord>, DeployError> {
    match current_client() {
        Some(client) => client.register_deploy(info),
        None => Err(DeployError::MissingCredential),
    }
}

/// The most recently registered deploy of the bound client, if any.
pub fn current_deploy() -> Option<Arc<DeployRecord>> {
    current_client().and_then(|client| client.current_deploy())
}

/// Turns report transmission on or off at runtime.
///
/// Capture keeps running either way; reports staged while transmission is
/// off stay pending until it is re-enabled.
pub fn set_transmit(enabled: bool) {
    if let Some(client) = current_client() {
        client.set_transmit(enabled);
    }
}

/// Whether the bound client currently transmits staged reports.
pub fn transmit_enabled() -> bool {
    current_client().map_or(false, |client| client.transmit_enabled())
}

/// Waits for the bound client's delivery queue to go quiescent.
///
/// Returns `true` once nothing is in flight and nothing is due, or when no
/// client is bound at all.
pub fn flush(timeout: Option<Duration>) -> bool {
    current_client().map_or(true, |client| client.flush(timeout))
}
