//! This provides testing functionality for building tests.
//!
//! **Feature:** `test` (*disabled by default*)
//!
//! If the crate has been compiled with the test support feature this module
//! becomes available and provides functionality to capture reports in a
//! block without talking to any real endpoint.
//!
//! # Example usage
//!
//! ```
//! # use faultline_core as faultline;
//! use faultline::test::with_captured_reports;
//! use faultline::protocol::Level;
//!
//! let reports = with_captured_reports(|| {
//!     faultline::capture_message("Hello World!", Level::Warning);
//! });
//! assert_eq!(reports.len(), 1);
//! assert_eq!(reports[0].message, "Hello World!");
//! ```

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use crate::protocol::CrashReport;
use crate::transport::{DeliveryError, Transport, TransportPayload};
use crate::{bind_client, unbind_client, Client, Options};

// The free-function API goes through one process-global client, so blocks
// that rebind it must not interleave.
static BIND_GUARD: Mutex<()> = Mutex::new(());

/// Collects reports instead of sending them.
///
/// # Examples
///
/// ```
/// # use faultline_core as faultline;
/// use faultline::test::TestTransport;
/// use faultline::Options;
/// use std::sync::Arc;
///
/// let transport = TestTransport::new();
/// let options = Options {
///     access_token: Some("test-access-token".into()),
///     transport: Some(Arc::new(transport.clone())),
///     ..Options::default()
/// };
/// let client = faultline::Client::with_options(options);
/// ```
pub struct TestTransport {
    collected: Mutex<Vec<CrashReport>>,
}

impl TestTransport {
    /// Creates a new test transport.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Arc<TestTransport> {
        Arc::new(TestTransport {
            collected: Mutex::new(vec![]),
        })
    }

    /// Fetches and clears the contained reports.
    pub fn fetch_and_clear_reports(&self) -> Vec<CrashReport> {
        let mut guard = self.collected.lock().unwrap();
        mem::take(&mut *guard)
    }
}

impl Transport for TestTransport {
    fn send(&self, payload: &TransportPayload) -> Result<(), DeliveryError> {
        let report = serde_json::from_slice(&payload.body)
            .expect("transport payload deserializes back into a report");
        self.collected.lock().unwrap().push(report);
        Ok(())
    }
}

/// Runs some code with a freshly bound test client and returns the
/// captured reports.
///
/// This is a shortcut for [`with_captured_reports_options`] with default
/// options.
pub fn with_captured_reports<F: FnOnce()>(f: F) -> Vec<CrashReport> {
    with_captured_reports_options(f, Options::default())
}

/// Runs some code with a test client built from the given options and
/// returns the captured reports.
///
/// If no access token is set on the options a test token is inserted. The
/// transport on the options is also overridden with a [`TestTransport`].
/// The previously bound client, if any, is restored afterwards.
pub fn with_captured_reports_options<F: FnOnce(), O: Into<Options>>(
    f: F,
    options: O,
) -> Vec<CrashReport> {
    let _bind = BIND_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
    let transport = TestTransport::new();
    let mut options = options.into();
    options.access_token = Some(
        options
            .access_token
            .unwrap_or_else(|| "test-access-token".into()),
    );
    options.transport = Some(Arc::new(transport.clone()));
    let client = Arc::new(Client::with_options(options));
    let previous = bind_client(client.clone());
    f();
    client.close(None);
    match previous {
        Some(previous) => {
            bind_client(previous);
        }
        None => {
            unbind_client();
        }
    }
    transport.fetch_and_clear_reports()
}
