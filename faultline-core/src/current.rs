//! The process-global client.
//!
//! Unlike request-scoped telemetry systems, a crash reporting agent has one
//! identity per process, so a single atomic slot replaces any scope stack.
//! Reads are lock-free and safe from a panic hook.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::Client;

static CURRENT_CLIENT: ArcSwapOption<Client> = ArcSwapOption::const_empty();

/// Binds a client as the process-global one, returning the one bound
/// before, if any.
///
/// The global client powers the free-function API and uncaught panic
/// reporting.
pub fn bind_client(client: Arc<Client>) -> Option<Arc<Client>> {
    CURRENT_CLIENT.swap(Some(client))
}

/// Removes the process-global client, returning it.
pub fn unbind_client() -> Option<Arc<Client>> {
    CURRENT_CLIENT.swap(None)
}

/// The currently bound client, if any.
pub fn current_client() -> Option<Arc<Client>> {
    CURRENT_CLIENT.load_full()
}
