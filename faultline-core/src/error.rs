use std::error::Error;

use crate::protocol::{CaptureEvent, CaptureKind};
use crate::utils::parse_type_from_debug;

/// Create a [`CaptureEvent`] from a `std::error::Error`.
///
/// The chain of sources is walked and joined into the reason, outermost
/// error first, so the report message reads like the chain of causes.
///
/// # Examples
///
/// ```
/// use thiserror::Error;
///
/// #[derive(Debug, Error)]
/// #[error("inner")]
/// struct InnerError;
///
/// #[derive(Debug, Error)]
/// #[error("outer")]
/// struct OuterError(#[from] InnerError);
///
/// let event = faultline_core::capture_event_from_error(&OuterError(InnerError));
/// assert_eq!(event.name.as_deref(), Some("OuterError"));
/// assert_eq!(event.reason, "outer: inner");
/// ```
pub fn capture_event_from_error<E: Error + ?Sized>(err: &E) -> CaptureEvent {
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        reason.push_str(": ");
        reason.push_str(&err.to_string());
        source = err.source();
    }

    let (thread_id, thread_name) = crate::backtrace_support::thread_label();
    CaptureEvent {
        name: Some(parse_type_from_debug(err)),
        thread_id,
        thread_name,
        ..CaptureEvent::new(CaptureKind::ApplicationError, reason)
    }
}
