use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use rand::random;

use crate::backtrace_support::{current_raw_stack, thread_label};
use crate::convert;
use crate::deploys::DeployLog;
use crate::error::capture_event_from_error;
use crate::guard::CapturedError;
use crate::hook;
use crate::options::Options;
use crate::protocol::{
    CaptureEvent, CaptureKind, CrashReport, DeployRecord, Level, ReportId, TelemetryEvent, UNKNOWN,
};
use crate::queue::DeliveryQueue;
use crate::telemetry::TelemetryRing;
use crate::{DeployError, DeployInfo};

/// The faultline client.
///
/// A client owns the whole reporting pipeline: the capture surface, the
/// deploy correlation log, the telemetry timeline and the background
/// delivery queue. Application code talks to it through cheap, non-blocking
/// calls; everything slow happens on the queue worker.
///
/// The client is created with [`Client::with_options`] or
/// [`Client::from_config`], and is inert (captures return `None`) when the
/// options hold no access token or no transport.
pub struct Client {
    options: Options,
    queue: RwLock<Option<DeliveryQueue>>,
    deploys: DeployLog,
    telemetry: TelemetryRing,
    last_report: RwLock<Option<ReportId>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .finish()
    }
}

impl RefUnwindSafe for Client {}

impl Client {
    /// Creates a new client from a config.
    ///
    /// # Supported Configs
    ///
    /// The following common values are supported for the client config:
    ///
    /// * `Options`: configure the client with the given options.
    /// * `()` or empty string: disable the client.
    /// * `&str` / `String`: configure the client with the given access token.
    /// * `(String, Options)`: access token plus options.
    pub fn from_config<O: Into<Options>>(config: O) -> Client {
        Client::with_options(config.into())
    }

    /// Creates a new client for the given options.
    ///
    /// If the options carry no access token, or `enabled` is off, the
    /// client is entirely disabled and every capture is dropped.
    pub fn with_options(options: Options) -> Client {
        let queue = if options.is_enabled() {
            match options.transport.as_ref() {
                Some(factory) => {
                    let transport = factory.create_transport(&options);
                    Some(DeliveryQueue::new(&options, transport))
                }
                None => {
                    faultline_debug!("[Client] no transport configured, captures will be dropped");
                    None
                }
            }
        } else {
            faultline_debug!("[Client] disabled or missing access token, client is inert");
            None
        };

        if options.capture_panics {
            hook::install_panic_hook();
        }

        Client {
            deploys: DeployLog::new(),
            telemetry: TelemetryRing::new(options.max_telemetry_events),
            queue: RwLock::new(queue),
            last_report: RwLock::new(None),
            options,
        }
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Quick check to see if the client is enabled.
    ///
    /// The client is enabled when it has an access token and a working
    /// delivery pipeline.
    pub fn is_enabled(&self) -> bool {
        self.options.is_enabled()
            && self
                .queue
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    /// Captures an event and stages the resulting report for delivery.
    ///
    /// Returns the id of the staged report, or `None` when the pipeline
    /// dropped the capture (disabled client, sampling or `before_report`).
    pub fn capture_event(&self, event: CaptureEvent) -> Option<ReportId> {
        let queue = self.queue.read().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = &*queue else {
            faultline_debug!("[Client] no delivery pipeline, capture dropped");
            return None;
        };
        let report = self.prepare_report(event)?;
        let id = report.id;
        queue.enqueue(report);
        *self.last_report.write().unwrap_or_else(PoisonError::into_inner) = Some(id);
        faultline_debug!("[Client] report {} staged for delivery", id);
        Some(id)
    }

    /// Captures a plain message at the given severity.
    pub fn capture_message(&self, message: impl Into<String>, level: Level) -> Option<ReportId> {
        let (thread_id, thread_name) = thread_label();
        let mut event = CaptureEvent {
            name: Some("message".into()),
            thread_id,
            thread_name,
            level: Some(level),
            ..CaptureEvent::new(CaptureKind::ApplicationError, message)
        };
        if self.options.attach_stacktrace {
            event.native_stack = current_raw_stack();
        }
        self.capture_event(event)
    }

    /// Captures an error with its full source chain.
    pub fn capture_error<E: std::error::Error + ?Sized>(&self, error: &E) -> Option<ReportId> {
        let mut event = capture_event_from_error(error);
        if self.options.attach_stacktrace {
            event.native_stack = current_raw_stack();
        }
        self.capture_event(event)
    }

    /// Returns the id of the last report staged on this client.
    pub fn last_report_id(&self) -> Option<ReportId> {
        *self.last_report.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an event to the telemetry timeline.
    ///
    /// The timeline is bounded (`max_telemetry_events`); a snapshot of it
    /// rides along on every subsequent report.
    pub fn record_telemetry(&self, event: TelemetryEvent) {
        self.telemetry.record(event);
    }

    /// Registers a deploy, making it the current one for future reports.
    ///
    /// The record is completed from configuration: a missing environment
    /// falls back to the configured one and the access token is stamped
    /// from the options.
    pub fn register_deploy(&self, info: DeployInfo) -> Result<Arc<DeployRecord>, DeployError> {
        let record = DeployRecord {
            revision: info.revision,
            environment: info
                .environment
                .unwrap_or_else(|| self.options.environment.clone().into_owned()),
            comment: info.comment,
            local_username: info.local_username,
            access_token: self.options.access_token.clone().unwrap_or_default(),
            registered_at: SystemTime::now(),
        };
        let record = self.deploys.register(record)?;
        faultline_debug!(
            "[Client] deploy {} registered for {}",
            record.revision,
            record.environment
        );
        Ok(record)
    }

    /// The most recently registered deploy, if any.
    pub fn current_deploy(&self) -> Option<Arc<DeployRecord>> {
        self.deploys.current()
    }

    /// Every deploy registered on this client, oldest first.
    pub fn deploy_history(&self) -> Vec<Arc<DeployRecord>> {
        self.deploys.records()
    }

    /// Turns report transmission on or off at runtime.
    ///
    /// Capture keeps running either way; with transmit off, staged reports
    /// stay pending until transmission is re-enabled.
    pub fn set_transmit(&self, enabled: bool) {
        if let Some(queue) = &*self.queue.read().unwrap_or_else(PoisonError::into_inner) {
            queue.set_transmit(enabled);
            faultline_debug!(
                "[Client] transmit {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// Whether staged reports are currently being transmitted.
    pub fn transmit_enabled(&self) -> bool {
        self.queue
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, DeliveryQueue::transmit_enabled)
    }

    /// Waits for the delivery queue to go quiescent.
    ///
    /// Returns `true` once nothing is in flight and nothing is due, or
    /// `false` when the timeout (default: `shutdown_timeout`) elapsed
    /// first. Reports parked for a future retry do not count as
    /// outstanding.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        if let Some(queue) = &*self.queue.read().unwrap_or_else(PoisonError::into_inner) {
            queue.flush(timeout.unwrap_or(self.options.shutdown_timeout))
        } else {
            true
        }
    }

    /// Flushes and then shuts the delivery pipeline down.
    ///
    /// Anything unfinished when the timeout elapses is left pending; with a
    /// spool directory configured it survives for the next process.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        let queue = self
            .queue
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match queue {
            Some(queue) => {
                let flushed = queue.flush(timeout.unwrap_or(self.options.shutdown_timeout));
                drop(queue);
                flushed
            }
            None => true,
        }
    }

    /// Captures an interception on behalf of a guard and shapes the
    /// caller-facing error from the same report.
    pub(crate) fn capture_interception(&self, event: CaptureEvent) -> CapturedError {
        let fallback = CapturedError {
            name: event.name.clone().unwrap_or_else(|| UNKNOWN.to_owned()),
            reason: event.reason.clone(),
            report_id: None,
            stack: Vec::new(),
        };
        let queue = self.queue.read().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = &*queue else {
            return fallback;
        };
        match self.prepare_report(event) {
            Some(report) => {
                let error = CapturedError {
                    name: report.classification.name.clone(),
                    reason: report.message.clone(),
                    report_id: Some(report.id),
                    stack: report.stack_trace.clone(),
                };
                *self.last_report.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(report.id);
                queue.enqueue(report);
                error
            }
            None => fallback,
        }
    }

    fn prepare_report(&self, event: CaptureEvent) -> Option<CrashReport> {
        if !self.sample_should_send() {
            faultline_debug!(
                "[Client] capture dropped by sampling (rate: {})",
                self.options.sample_rate
            );
            return None;
        }
        let report = convert::report_from_event(
            event,
            &self.options,
            self.deploys.current().map(|record| record.snapshot()),
            self.telemetry.snapshot(),
        );
        if let Some(callback) = &self.options.before_report {
            match callback(report) {
                Some(report) => Some(report),
                None => {
                    faultline_debug!("[Client] report dropped by before_report");
                    None
                }
            }
        } else {
            Some(report)
        }
    }

    fn sample_should_send(&self) -> bool {
        let rate = self.options.sample_rate;
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            random::<f32>() < rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::transport::{DeliveryError, Transport, TransportPayload};

    #[derive(Default)]
    struct CollectingTransport {
        payloads: Mutex<Vec<TransportPayload>>,
    }

    impl CollectingTransport {
        fn reports(&self) -> Vec<CrashReport> {
            self.payloads
                .lock()
                .unwrap()
                .iter()
                .map(|payload| serde_json::from_slice(&payload.body).unwrap())
                .collect()
        }
    }

    impl Transport for CollectingTransport {
        fn send(&self, payload: &TransportPayload) -> Result<(), DeliveryError> {
            self.payloads.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn collecting_client(configure: impl FnOnce(&mut Options)) -> (Client, Arc<CollectingTransport>) {
        let transport = Arc::new(CollectingTransport::default());
        let mut options = Options {
            access_token: Some("test-token".into()),
            transport: Some(Arc::new(transport.clone())),
            ..Default::default()
        };
        configure(&mut options);
        (Client::with_options(options), transport)
    }

    #[test]
    fn test_disabled_client_drops_captures() {
        let client = Client::from_config(());
        assert!(!client.is_enabled());
        assert!(client.capture_message("lost", Level::Error).is_none());
    }

    #[test]
    fn test_enabled_without_transport_drops_captures() {
        let client = Client::from_config("some-token");
        assert!(!client.is_enabled());
        assert!(client.capture_message("lost", Level::Error).is_none());
    }

    #[test]
    fn test_capture_message_is_delivered() {
        let (client, transport) = collecting_client(|options| {
            options.environment = "testing".into();
            options.code_version = Some("1.2.3".into());
        });
        assert!(client.is_enabled());

        let id = client.capture_message("disk is full", Level::Warning);
        assert!(id.is_some());
        assert_eq!(client.last_report_id(), id);
        assert!(client.flush(Some(Duration::from_secs(5))));

        let reports = transport.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, id.unwrap());
        assert_eq!(reports[0].message, "disk is full");
        assert_eq!(reports[0].level, Level::Warning);
        assert_eq!(reports[0].environment, "testing");
        assert_eq!(reports[0].code_version.as_deref(), Some("1.2.3"));
        assert_eq!(reports[0].classification.kind, CaptureKind::ApplicationError);
    }

    #[test]
    fn test_zero_sample_rate_drops_everything() {
        let (client, transport) = collecting_client(|options| {
            options.sample_rate = 0.0;
        });
        assert!(client.capture_message("sampled out", Level::Error).is_none());
        assert!(client.flush(Some(Duration::from_secs(5))));
        assert!(transport.reports().is_empty());
    }

    #[test]
    fn test_before_report_can_mutate_and_drop() {
        let (client, transport) = collecting_client(|options| {
            options.before_report = Some(Arc::new(|mut report: CrashReport| {
                if report.message.contains("secret") {
                    return None;
                }
                report.message = report.message.replace("disk", "volume");
                Some(report)
            }));
        });

        assert!(client.capture_message("secret stuff", Level::Error).is_none());
        assert!(client.capture_message("disk is full", Level::Error).is_some());
        assert!(client.flush(Some(Duration::from_secs(5))));

        let reports = transport.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].message, "volume is full");
    }

    #[test]
    fn test_reports_stamp_the_current_deploy() {
        let (client, transport) = collecting_client(|options| {
            options.environment = "production".into();
        });

        client.capture_message("before any deploy", Level::Error);
        client
            .register_deploy(DeployInfo::new("abc123"))
            .unwrap();
        client.capture_message("after the deploy", Level::Error);
        assert!(client.flush(Some(Duration::from_secs(5))));

        let reports = transport.reports();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].deploy.is_none());
        let stamped = reports[1].deploy.as_ref().unwrap();
        assert_eq!(stamped.revision, "abc123");
        assert_eq!(stamped.environment, "production");
    }

    #[test]
    fn test_reports_carry_the_telemetry_timeline() {
        let (client, transport) = collecting_client(|_| {});

        client.record_telemetry(TelemetryEvent::log("starting up"));
        client.record_telemetry(TelemetryEvent::navigation("login", "dashboard"));
        client.capture_message("crashed right after", Level::Error);
        assert!(client.flush(Some(Duration::from_secs(5))));

        let reports = transport.reports();
        assert_eq!(reports[0].telemetry.len(), 2);
    }

    #[test]
    fn test_capture_error_reports_the_chain() {
        use thiserror::Error;

        #[derive(Debug, Error)]
        #[error("no space left")]
        struct DiskFull;

        #[derive(Debug, Error)]
        #[error("cache write failed")]
        struct CacheError(#[from] DiskFull);

        let (client, transport) = collecting_client(|_| {});
        client.capture_error(&CacheError::from(DiskFull));
        assert!(client.flush(Some(Duration::from_secs(5))));

        let reports = transport.reports();
        assert_eq!(reports[0].classification.name, "CacheError");
        assert_eq!(reports[0].message, "cache write failed: no space left");
    }

    #[test]
    fn test_transmit_toggle_round_trip() {
        let (client, transport) = collecting_client(|options| {
            options.transmit = false;
        });

        client.capture_message("parked", Level::Error);
        assert!(client.flush(Some(Duration::from_secs(5))));
        assert!(transport.reports().is_empty());
        assert!(!client.transmit_enabled());

        client.set_transmit(true);
        assert!(client.flush(Some(Duration::from_secs(5))));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while transport.reports().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(transport.reports().len(), 1);
    }

    #[test]
    fn test_close_is_terminal() {
        let (client, transport) = collecting_client(|_| {});
        client.capture_message("last words", Level::Error);
        assert!(client.close(Some(Duration::from_secs(5))));
        assert_eq!(transport.reports().len(), 1);
        assert!(!client.is_enabled());
        assert!(client.capture_message("after close", Level::Error).is_none());
    }
}
