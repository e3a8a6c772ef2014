use std::sync::Arc;

use crate::defaults::apply_defaults;
use crate::{Client, Options};
use faultline_core::faultline_debug;

/// Helper struct that is returned from `init`.
///
/// When this is dropped the delivery queue is drained with the configured
/// shutdown timeout and the queue is shut down.
#[must_use = "when the init guard is dropped the delivery queue will be shut down and no \
              further reports can be sent.  If you do want to ignore this use mem::forget on it."]
pub struct ClientInitGuard(Arc<Client>);

impl ClientInitGuard {
    /// Quick check if the client is enabled.
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }
}

impl Drop for ClientInitGuard {
    fn drop(&mut self) {
        if self.is_enabled() {
            faultline_debug!("dropping client guard -> disposing client");
        } else {
            faultline_debug!("dropping client guard (no client to dispose)");
        }
        self.0.close(None);
    }
}

/// Creates the faultline client for a given configuration and binds it as
/// the process-wide client.
///
/// This returns a client init guard that must be kept in scope; it will
/// help the client deliver reports before the application closes. When the
/// guard is dropped the delivery queue that was initialized shuts down and
/// no further reports can be sent.
///
/// If you don't want (or can) keep the guard around it's permissible to
/// call `mem::forget` on it.
///
/// # Examples
///
/// ```
/// let _faultline = faultline::init("0123456789abcdef0123456789abcdef");
/// ```
///
/// Or if draining on shutdown should be ignored:
///
/// ```
/// std::mem::forget(faultline::init("0123456789abcdef0123456789abcdef"));
/// ```
///
/// The guard returned can also be inspected to see if a client has been
/// created to enable further configuration:
///
/// ```
/// let faultline = faultline::init(faultline::Options {
///     code_version: faultline::release_version!(),
///     ..Default::default()
/// });
/// if faultline.is_enabled() {
///     // further setup that only makes sense with reporting enabled
/// }
/// ```
///
/// This behaves similar to creating a client by calling
/// `Client::from_config` and then binding it with `bind_client`, except
/// that it also applies the defaults from [`apply_defaults`]. For the
/// configuration formats accepted see `Client::from_config`.
pub fn init<C>(opts: C) -> ClientInitGuard
where
    C: Into<Options>,
{
    let opts = apply_defaults(opts.into());
    let client = Arc::new(Client::with_options(opts));
    faultline_core::bind_client(client.clone());
    if client.is_enabled() {
        faultline_debug!(
            "enabled faultline client for endpoint {}",
            client.options().endpoint
        );
    } else {
        faultline_debug!("initialized disabled faultline client (disabled or missing access token)");
    }
    ClientInitGuard(client)
}
