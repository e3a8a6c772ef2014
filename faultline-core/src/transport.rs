use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{CrashReport, ReportId};
use crate::Options;

/// The outcome of a failed delivery attempt.
///
/// This error never crosses into application code. The delivery worker
/// consumes it to decide between scheduling a retry and abandoning the
/// report.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The attempt failed for a reason that may go away, such as a network
    /// error, a server error or throttling.
    #[error("retryable delivery failure: {message}")]
    Retryable {
        /// Description of the failure for diagnostics.
        message: String,
        /// A server-provided minimum delay before the next attempt.
        retry_after: Option<Duration>,
    },
    /// The attempt failed for a reason retrying cannot fix, such as a
    /// rejected access token or an unprocessable payload.
    #[error("permanent delivery failure: {message}")]
    Permanent {
        /// Description of the failure for diagnostics.
        message: String,
    },
}

impl DeliveryError {
    /// Creates a retryable failure.
    pub fn retryable(message: impl Into<String>) -> DeliveryError {
        DeliveryError::Retryable {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Creates a retryable failure carrying a server-provided retry delay.
    pub fn retryable_after(message: impl Into<String>, retry_after: Duration) -> DeliveryError {
        DeliveryError::Retryable {
            message: message.into(),
            retry_after: Some(retry_after),
        }
    }

    /// Creates a permanent failure.
    pub fn permanent(message: impl Into<String>) -> DeliveryError {
        DeliveryError::Permanent {
            message: message.into(),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Retryable { .. })
    }

    /// The server-provided minimum delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DeliveryError::Retryable { retry_after, .. } => *retry_after,
            DeliveryError::Permanent { .. } => None,
        }
    }
}

/// A serialized report ready for transport.
#[derive(Clone, Debug)]
pub struct TransportPayload {
    /// The id of the serialized report.
    pub report_id: ReportId,
    /// The JSON body of the report.
    pub body: Vec<u8>,
}

impl TransportPayload {
    /// Serializes a report into a payload.
    pub fn from_report(report: &CrashReport) -> Result<TransportPayload, serde_json::Error> {
        Ok(TransportPayload {
            report_id: report.id,
            body: serde_json::to_vec(report)?,
        })
    }
}

/// The trait that transports need to implement.
///
/// A transport speaks to the collection endpoint from the delivery worker
/// thread. `send` blocks for one attempt and reports the tri-state outcome:
/// success, retryable failure or permanent failure. Retry scheduling,
/// persistence and ordering are the delivery queue's business, never the
/// transport's.
pub trait Transport: Send + Sync + 'static {
    /// Performs one delivery attempt for the given payload.
    fn send(&self, payload: &TransportPayload) -> Result<(), DeliveryError>;
}

/// A factory creating a transport for the given options.
pub trait TransportFactory: Send + Sync {
    /// Given the options, this creates a new transport.
    fn create_transport(&self, options: &Options) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Options) -> Arc<dyn Transport> + Clone + Send + Sync,
{
    fn create_transport(&self, options: &Options) -> Arc<dyn Transport> {
        (*self)(options)
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, payload: &TransportPayload) -> Result<(), DeliveryError> {
        (**self).send(payload)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, _options: &Options) -> Arc<dyn Transport> {
        self.clone()
    }
}
