//! The panic hook capture backend.
//!
//! A single process-wide hook serves two paths. Panics that unwind into a
//! guarded section are stashed for the [`ExceptionGuard`](crate::ExceptionGuard)
//! on that thread, which turns them into recoverable values. Panics outside
//! any guarded section are uncaught crashes: they are captured through the
//! bound client, flushed, and then handed to whatever hook was registered
//! before ours.
//!
//! The hook runs at the panic site, before unwinding, which is the only
//! point where the crash site stack is still on the thread.

use std::panic::{self, PanicHookInfo};
use std::sync::Once;

use crate::backtrace_support::{current_raw_stack, thread_label};
use crate::guard;
use crate::protocol::{CaptureEvent, CaptureKind, Level};

static INIT: Once = Once::new();

/// Installs the panic hook once per process.
///
/// For uncaught panics the previously registered hook keeps running after
/// ours. Panics inside guarded sections are consumed by the guard and not
/// forwarded, so intercepted exceptions stay silent on stderr.
pub(crate) fn install_panic_hook() {
    INIT.call_once(|| {
        let next = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if guard::in_guarded_section() {
                guard::stash_capture(event_from_panic_info(info));
            } else {
                panic_handler(info);
                next(info);
            }
        }));
    });
}

/// Extract the message of a panic.
pub fn message_from_panic_info<'a>(info: &'a PanicHookInfo<'_>) -> &'a str {
    guard::message_from_panic_payload(info.payload())
}

/// Builds a capture for the panic currently unwinding this thread.
fn event_from_panic_info(info: &PanicHookInfo<'_>) -> CaptureEvent {
    let (thread_id, thread_name) = thread_label();
    CaptureEvent {
        name: Some("panic".into()),
        native_stack: current_raw_stack(),
        thread_id,
        thread_name,
        ..CaptureEvent::new(CaptureKind::NativeException, message_from_panic_info(info))
    }
}

fn panic_handler(info: &PanicHookInfo<'_>) {
    if let Some(client) = crate::current_client() {
        let mut event = event_from_panic_info(info);
        event.level = Some(Level::Critical);
        crate::faultline_debug!("uncaught panic: {}", event.reason);
        client.capture_event(event);
        client.flush(None);
    }
}
