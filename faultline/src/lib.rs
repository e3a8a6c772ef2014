//! This crate provides the Rust agent for the [Faultline] crash and error
//! reporting service. It intercepts panics at guarded boundaries, records
//! uncaught crashes, correlates reports with deploys and ships everything
//! through a failure tolerant background delivery queue.
//!
//! # Quickstart
//!
//! The most convenient way to use this crate is the [`faultline::init`]
//! function, which starts a client with a default HTTP transport and binds
//! it as the process-wide client.
//!
//! The [`faultline::init`] function returns a guard that when dropped drains
//! reports that were not yet delivered. It has a two second deadline for
//! this, so shutdown of applications might slightly delay as a result. Keep
//! the guard around or sending reports will not work.
//!
//! ```
//! let _guard = faultline::init("0123456789abcdef0123456789abcdef");
//! faultline::capture_message("Hello World!", faultline::Level::Info);
//! // when the guard goes out of scope here, the client will wait up to
//! // two seconds for pending reports to be delivered.
//! ```
//!
//! More advanced configuration goes through [`Options`]:
//!
//! ```
//! let _guard = faultline::init(("0123456789abcdef0123456789abcdef", faultline::Options {
//!     environment: "production".into(),
//!     code_version: faultline::release_version!(),
//!     ..Default::default()
//! }));
//! ```
//!
//! # Guarded execution
//!
//! Work wrapped in an [`ExceptionGuard`] cannot take the process down: a
//! panic inside the guarded section is captured as a report and returned to
//! the caller as a [`CapturedError`] value instead of unwinding further.
//!
//! ```
//! use std::sync::Arc;
//!
//! let client = Arc::new(faultline::Client::from_config(()));
//! let guard = faultline::ExceptionGuard::new(client);
//! assert!(!guard.try_execute(|| panic!("lost a wheel")));
//! ```
//!
//! # Minimal API
//!
//! This crate comes with the default HTTP transport built in. If the goal
//! is to embed the agent with a custom [`Transport`], or to avoid the HTTP
//! client dependencies entirely, one should use the [`faultline-core`]
//! crate instead.
//!
//! [Faultline]: https://faultline.dev/
//! [`faultline::init`]: fn.init.html
//! [`faultline-core`]: https://crates.io/crates/faultline-core
//!
//! # Features
//!
//! Functionality of the crate can be turned on and off by feature flags.
//! This is the current list of feature flags:
//!
//! Default features:
//!
//! * `transport`: Enables the default transport, which is currently
//!   `reqwest` with `native-tls`.
//!
//! Additional features:
//!
//! * `test`: Enables testing support.
//! * `debug-logs`: Uses the `log` crate for internal logging.
//! * `reqwest`: Enables the `reqwest` transport, which is currently the
//!   default.
//! * `native-tls`: Uses the `native-tls` crate. This only has an effect on
//!   the `reqwest` transport and is currently the default.
//! * `rustls`: Enables the `rustls` support of the `reqwest` transport.
//!   Please note that `native-tls` is a default feature, and one needs to
//!   use `default-features = false` to completely disable building
//!   `native-tls` dependencies.

#![warn(missing_docs)]

mod defaults;
mod init;

// re-export from core
#[doc(inline)]
pub use faultline_core::*;

// added public API
pub use crate::defaults::apply_defaults;
pub use crate::init::{init, ClientInitGuard};

pub mod transports;
