use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use crate::backtrace_support::{current_raw_stack, thread_label};
use crate::protocol::{CaptureEvent, CaptureKind, FrameRecord, ReportId};
use crate::Client;

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static STASHED_CAPTURE: RefCell<Option<CaptureEvent>> = const { RefCell::new(None) };
}

/// Whether the current thread is inside a guarded section.
///
/// The panic hook consults this: a panic inside a guarded section is stashed
/// for the guard instead of being reported as an uncaught crash, so each
/// interception produces exactly one report.
pub(crate) fn in_guarded_section() -> bool {
    GUARD_DEPTH.with(|depth| depth.get() > 0)
}

/// Stashes the capture of a panic that is about to unwind into a guard on
/// this thread.
pub(crate) fn stash_capture(event: CaptureEvent) {
    STASHED_CAPTURE.with(|slot| *slot.borrow_mut() = Some(event));
}

fn take_stashed_capture() -> Option<CaptureEvent> {
    STASHED_CAPTURE.with(|slot| slot.borrow_mut().take())
}

struct Section;

impl Section {
    fn enter() -> Section {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Section
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// The recoverable value a guarded section produces when it intercepts a
/// native exception.
///
/// Its `Display` form is `<name>: <reason>`, so the message always contains
/// the original panic reason.
#[derive(Debug, Error)]
#[error("{name}: {reason}")]
pub struct CapturedError {
    /// Symbolic name of the intercepted condition, such as `panic`.
    pub name: String,
    /// The reason string of the intercepted condition.
    pub reason: String,
    /// Id of the report that was queued for this interception. `None` when
    /// the pipeline dropped the capture (disabled client or sampling).
    pub report_id: Option<ReportId>,
    /// The cleaned stack of the interception, oldest call first.
    pub stack: Vec<FrameRecord>,
}

/// Runs application code with native exception interception.
///
/// A guard wraps a closure so that a panic inside it does not unwind into
/// the caller: [`try_execute`](ExceptionGuard::try_execute) reports whether
/// the closure ran to completion and [`execute`](ExceptionGuard::execute)
/// hands back a typed [`CapturedError`]. Every interception is also
/// captured as a report and queued for delivery, whether or not the caller
/// inspects the returned value.
///
/// Interception is scoped to the wrapped call on the current thread.
/// Guarded sections on different threads, or nested on one thread, never
/// observe each other's panics.
///
/// # Examples
///
/// ```
/// # let client = std::sync::Arc::new(faultline_core::Client::with_options(Default::default()));
/// let guard = faultline_core::ExceptionGuard::new(client);
/// assert!(guard.try_execute(|| ()));
/// assert!(!guard.try_execute(|| panic!("boom")));
/// ```
pub struct ExceptionGuard {
    client: Arc<Client>,
}

impl ExceptionGuard {
    /// Creates a guard reporting through the given client.
    pub fn new(client: Arc<Client>) -> ExceptionGuard {
        ExceptionGuard { client }
    }

    /// Runs `work`, reporting whether it completed without interception.
    pub fn try_execute<F, R>(&self, work: F) -> bool
    where
        F: FnOnce() -> R,
    {
        self.execute(work).is_ok()
    }

    /// Runs `work`, returning its value or the typed capture of the
    /// intercepted exception.
    pub fn execute<F, R>(&self, work: F) -> Result<R, CapturedError>
    where
        F: FnOnce() -> R,
    {
        let section = Section::enter();
        let result = panic::catch_unwind(AssertUnwindSafe(work));
        drop(section);

        match result {
            Ok(value) => {
                // An application-level catch_unwind inside `work` can leave
                // a stale stash behind. Never let it leak into the next
                // interception.
                take_stashed_capture();
                Ok(value)
            }
            Err(payload) => {
                let event = take_stashed_capture()
                    .unwrap_or_else(|| event_from_panic_payload(payload.as_ref()));
                Err(self.client.capture_interception(event))
            }
        }
    }
}

/// Builds a capture for a panic payload caught without hook assistance.
///
/// The stack here is the catch site, not the crash site; the crash site
/// stack is only available through the panic hook stash.
fn event_from_panic_payload(payload: &(dyn Any + Send)) -> CaptureEvent {
    let (thread_id, thread_name) = thread_label();
    CaptureEvent {
        name: Some("panic".into()),
        native_stack: current_raw_stack(),
        thread_id,
        thread_name,
        ..CaptureEvent::new(
            CaptureKind::NativeException,
            message_from_panic_payload(payload),
        )
    }
}

/// Extract the message of a panic payload.
pub(crate) fn message_from_panic_payload(payload: &(dyn Any + Send)) -> &str {
    match payload.downcast_ref::<&'static str>() {
        Some(s) => s,
        None => match payload.downcast_ref::<String>() {
            Some(s) => &s[..],
            None => "Box<Any>",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(message_from_panic_payload(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(message_from_panic_payload(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(17usize);
        assert_eq!(message_from_panic_payload(payload.as_ref()), "Box<Any>");
    }

    #[test]
    fn test_guard_depth_is_scoped() {
        assert!(!in_guarded_section());
        {
            let _outer = Section::enter();
            assert!(in_guarded_section());
            {
                let _inner = Section::enter();
                assert!(in_guarded_section());
            }
            assert!(in_guarded_section());
        }
        assert!(!in_guarded_section());
    }

    #[test]
    fn test_guard_depth_is_thread_local() {
        let _section = Section::enter();
        assert!(in_guarded_section());
        std::thread::spawn(|| assert!(!in_guarded_section()))
            .join()
            .unwrap();
    }

    #[test]
    fn test_stash_take_clears_slot() {
        stash_capture(CaptureEvent::new(CaptureKind::NativeException, "boom"));
        assert!(take_stashed_capture().is_some());
        assert!(take_stashed_capture().is_none());
    }
}
