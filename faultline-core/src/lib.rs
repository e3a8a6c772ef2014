//! This crate provides the core of the [Faultline] crash and error
//! reporting agent: capture, conversion, deploy correlation and the
//! asynchronous delivery pipeline.
//!
//! `faultline-core` is meant for transport authors and for embedding the
//! agent into larger systems. Regular users who wish to report from their
//! applications should instead use the [`faultline`] crate, which comes
//! with a default HTTP transport.
//!
//! # Core Concepts
//!
//! The [`Client`] owns the whole pipeline. Abnormal conditions enter it as
//! [`protocol::CaptureEvent`]s, either through the capture functions
//! ([`capture_message`], [`capture_error`]) or through an
//! [`ExceptionGuard`] wrapping application code. Every accepted capture is
//! converted into a [`protocol::CrashReport`] and staged on a background
//! delivery queue that retries with exponential backoff, survives process
//! restarts through an on-disk spool, and never lets a delivery problem
//! surface in application code.
//!
//! Reports are shipped by a [`Transport`]; the [`TransportFactory`] trait
//! is the extension point for bringing your own.
//!
//! # Guarded execution
//!
//! ```
//! use std::sync::Arc;
//!
//! let client = Arc::new(faultline_core::Client::from_config(()));
//! let guard = faultline_core::ExceptionGuard::new(client);
//!
//! assert!(guard.try_execute(|| ()));
//! assert!(!guard.try_execute(|| panic!("boom")));
//!
//! let outcome = guard.execute(|| panic!("spilled the milk"));
//! let error = outcome.unwrap_err();
//! assert!(error.to_string().contains("spilled the milk"));
//! ```
//!
//! # Features
//!
//! - `feature = "test"`: Activates the [`test`] module, which can be used
//!   to write integration tests. It comes with a test transport which can
//!   capture all sent reports for inspection.
//! - `feature = "debug-logs"`: Uses the `log` crate for debug output,
//!   instead of printing to `stderr`.
//!
//! [Faultline]: https://faultline.dev/
//! [`faultline`]: https://crates.io/crates/faultline
//! [`test`]: test/index.html

#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod api;
mod backtrace_support;
mod client;
mod constants;
mod convert;
mod current;
mod deploys;
mod error;
mod guard;
mod host;
mod hook;
mod options;
mod queue;
mod spool;
mod telemetry;
mod transport;
mod utils;

// public api or exports from this crate
pub use crate::api::*;
pub use crate::client::Client;
pub use crate::constants::{DEFAULT_ENDPOINT, USER_AGENT, VERSION};
pub use crate::current::{bind_client, current_client, unbind_client};
pub use crate::deploys::{DeployError, DeployInfo};
pub use crate::error::capture_event_from_error;
pub use crate::guard::{CapturedError, ExceptionGuard};
pub use crate::hook::message_from_panic_info;
pub use crate::options::{BeforeReport, Options};
pub use crate::transport::{DeliveryError, Transport, TransportFactory, TransportPayload};
pub use crate::utils::parse_type_from_debug;

// test utilities
#[cfg(feature = "test")]
pub mod test;

// public api from other crates
#[doc(inline)]
pub use faultline_types as protocol;
pub use faultline_types::{
    CaptureEvent, CaptureKind, CrashReport, DeployRecord, Level, ReportId, TelemetryEvent,
};
