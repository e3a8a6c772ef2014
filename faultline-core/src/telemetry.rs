use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::protocol::TelemetryEvent;

/// Bounded ring of recent telemetry events.
///
/// Recording is a short lock around a deque push; when the ring is full the
/// oldest event is dropped first. Conversion snapshots the ring into every
/// report so that each report carries a short history of what the
/// application did before the capture.
pub(crate) struct TelemetryRing {
    limit: usize,
    events: Mutex<VecDeque<TelemetryEvent>>,
}

impl TelemetryRing {
    pub fn new(limit: usize) -> TelemetryRing {
        TelemetryRing {
            limit,
            events: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    pub fn record(&self, event: TelemetryEvent) {
        if self.limit == 0 {
            return;
        }
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(event);
        while events.len() > self.limit {
            events.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<TelemetryEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().cloned().collect()
    }
}
