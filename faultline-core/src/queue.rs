//! The asynchronous delivery pipeline.
//!
//! A [`DeliveryQueue`] owns every report from capture to terminal outcome.
//! Callers only ever stage entries; a single background worker does the
//! heavy lifting (spool writes, serialization, network attempts) so that
//! capture paths stay non-blocking. The queue mutex guards metadata only
//! and is never held across I/O.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crate::options::Options;
use crate::protocol::{CrashReport, DeliveryQueueEntry, DeliveryState, ReportId};
use crate::spool::Spool;
use crate::transport::{DeliveryError, Transport, TransportPayload};

struct Slot {
    entry: DeliveryQueueEntry,
    persisted: bool,
    attempting: bool,
}

struct QueueState {
    /// Staged entries in capture order. At most one slot is `attempting`.
    slots: VecDeque<Slot>,
    /// Spool records scheduled for removal by the worker.
    purge: Vec<ReportId>,
    in_flight: bool,
    shutdown: bool,
}

struct QueueShared {
    state: Mutex<QueueState>,
    /// Wakes the worker: new entries, transmit toggles, shutdown.
    signal: Condvar,
    /// Wakes `flush` waiters whenever the worker goes quiescent.
    idle: Condvar,
    transmit: AtomicBool,
    transport: Arc<dyn Transport>,
    spool: Option<Spool>,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_ceiling: Duration,
}

pub(crate) struct DeliveryQueue {
    shared: Arc<QueueShared>,
    max_queue_size: usize,
    worker: Option<JoinHandle<()>>,
}

impl DeliveryQueue {
    /// Creates the queue and spawns its worker thread.
    ///
    /// When a spool directory is configured, entries persisted by an
    /// earlier process are loaded back in capture order, re-staged as
    /// pending.
    pub fn new(options: &Options, transport: Arc<dyn Transport>) -> DeliveryQueue {
        let spool = options.spool_dir.as_ref().and_then(|dir| match Spool::new(dir) {
            Ok(spool) => Some(spool),
            Err(err) => {
                faultline_debug!("spool directory {:?} unusable: {}", dir, err);
                None
            }
        });

        let mut slots = VecDeque::new();
        if let Some(spool) = &spool {
            match spool.load_all() {
                Ok(entries) => {
                    for entry in entries {
                        slots.push_back(Slot {
                            entry,
                            persisted: true,
                            attempting: false,
                        });
                    }
                }
                Err(err) => faultline_debug!("spool recovery failed: {}", err),
            }
            while slots.len() > options.max_queue_size {
                if let Some(slot) = slots.pop_front() {
                    faultline_debug!(
                        "spool holds more than {} reports, dropping {}",
                        options.max_queue_size,
                        slot.entry.id()
                    );
                    spool.remove(slot.entry.id()).ok();
                }
            }
        }

        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                slots,
                purge: Vec::new(),
                in_flight: false,
                shutdown: false,
            }),
            signal: Condvar::new(),
            idle: Condvar::new(),
            transmit: AtomicBool::new(options.transmit),
            transport,
            spool,
            max_attempts: options.max_attempts,
            backoff_base: options.retry_backoff_base,
            backoff_ceiling: options.retry_backoff_ceiling,
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("faultline-queue".into())
            .spawn(move || worker_loop(&worker_shared))
            .ok();

        DeliveryQueue {
            shared,
            max_queue_size: options.max_queue_size,
            worker,
        }
    }

    /// Stages a report for delivery. Never blocks on I/O.
    ///
    /// Over capacity, the oldest pending entry is evicted first; when every
    /// older slot is busy the incoming report is the one dropped. Eviction
    /// is terminal.
    pub fn enqueue(&self, report: CrashReport) {
        let incoming = report.id;
        let mut evicted = Vec::new();
        let mut dropped_incoming = false;
        {
            let mut state = self.shared.lock_state();
            while state.slots.len() >= self.max_queue_size {
                match state.slots.iter().position(|slot| !slot.attempting) {
                    Some(pos) => {
                        if let Some(slot) = state.slots.remove(pos) {
                            state.purge.push(slot.entry.id());
                            evicted.push(slot.entry.id());
                        }
                    }
                    None => {
                        dropped_incoming = true;
                        break;
                    }
                }
            }
            if !dropped_incoming {
                state.slots.push_back(Slot {
                    entry: DeliveryQueueEntry::new(report),
                    persisted: false,
                    attempting: false,
                });
            }
        }
        self.shared.signal.notify_all();
        for id in evicted {
            faultline_debug!("delivery queue over capacity, dropped oldest report {}", id);
        }
        if dropped_incoming {
            faultline_debug!("delivery queue over capacity, dropped report {}", incoming);
        }
    }

    /// Turns transmission on or off at runtime.
    ///
    /// While off, staged entries stay pending indefinitely; re-enabling
    /// resumes delivery where it left off.
    pub fn set_transmit(&self, enabled: bool) {
        self.shared.transmit.store(enabled, Ordering::SeqCst);
        self.shared.signal.notify_all();
        self.shared.idle.notify_all();
    }

    pub fn transmit_enabled(&self) -> bool {
        self.shared.transmit.load(Ordering::SeqCst)
    }

    /// Waits until the queue is quiescent: nothing in flight, nothing due,
    /// everything staged is on disk. Entries parked for a future retry or
    /// behind a disabled transmit gate do not count as outstanding.
    ///
    /// Returns `false` when the timeout elapsed first.
    pub fn flush(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        let mut state = self.shared.lock_state();
        self.shared.signal.notify_all();
        loop {
            if self.shared.is_quiescent(&state) {
                return true;
            }
            let Some(remaining) = timeout.checked_sub(started.elapsed()) else {
                return false;
            };
            state = self
                .shared
                .idle
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    #[cfg(test)]
    fn entries(&self) -> Vec<DeliveryQueueEntry> {
        self.shared
            .lock_state()
            .slots
            .iter()
            .map(|slot| slot.entry.clone())
            .collect()
    }
}

impl Drop for DeliveryQueue {
    fn drop(&mut self) {
        self.shared.lock_state().shutdown = true;
        self.shared.signal.notify_all();
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
        // The worker is gone; bring the spool up to date ourselves.
        let (leftovers, to_purge) = {
            let mut state = self.shared.lock_state();
            let leftovers: Vec<_> = state
                .slots
                .iter_mut()
                .filter(|slot| !slot.persisted)
                .map(|slot| {
                    slot.persisted = true;
                    slot.entry.clone()
                })
                .collect();
            (leftovers, std::mem::take(&mut state.purge))
        };
        for entry in &leftovers {
            self.shared.spool_store(entry);
        }
        for id in to_purge {
            self.shared.spool_remove(id);
        }
    }
}

impl QueueShared {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transmit_enabled(&self) -> bool {
        self.transmit.load(Ordering::SeqCst)
    }

    fn is_quiescent(&self, state: &QueueState) -> bool {
        if state.in_flight || !state.purge.is_empty() {
            return false;
        }
        if state.slots.iter().any(|slot| !slot.persisted) {
            return false;
        }
        if !self.transmit_enabled() {
            return true;
        }
        let now = SystemTime::now();
        !state.slots.iter().any(|slot| slot.entry.is_due(now))
    }

    /// How long the worker may sleep before the earliest retry window
    /// opens. `None` means there is nothing to wait for but a signal.
    fn sleep_duration(&self, state: &QueueState, now: SystemTime) -> Option<Duration> {
        if !self.transmit_enabled() || state.slots.is_empty() {
            return None;
        }
        state
            .slots
            .iter()
            .filter_map(|slot| slot.entry.next_attempt_not_before)
            .map(|at| at.duration_since(now).unwrap_or(Duration::ZERO))
            .min()
    }

    fn spool_store(&self, entry: &DeliveryQueueEntry) {
        if let Some(spool) = &self.spool {
            if let Err(err) = spool.store(entry) {
                faultline_debug!("failed to spool report {}: {}", entry.id(), err);
            }
        }
    }

    fn spool_remove(&self, id: ReportId) {
        if let Some(spool) = &self.spool {
            if let Err(err) = spool.remove(id) {
                faultline_debug!("failed to drop spool record {}: {}", id, err);
            }
        }
    }

    /// Runs one delivery attempt, then applies its outcome.
    ///
    /// The entry stays in its slot for the whole attempt so capture order
    /// is never disturbed; only terminal outcomes remove it.
    fn attempt(&self, entry: DeliveryQueueEntry) {
        let id = entry.id();
        let outcome = TransportPayload::from_report(&entry.report)
            .map_err(|err| DeliveryError::permanent(format!("unserializable report: {err}")))
            .and_then(|payload| self.transport.send(&payload));

        let mut state = self.lock_state();
        state.in_flight = false;
        let pos = state.slots.iter().position(|slot| slot.entry.id() == id);
        if let Some(pos) = pos {
            self.apply_outcome(state, pos, id, outcome);
        } else {
            // Nothing removes an attempting slot but this function.
            drop(state);
            self.idle.notify_all();
            crate::debug_panic_or_log!("in-flight report {} vanished from the queue", id);
        }
    }

    fn apply_outcome(
        &self,
        mut state: std::sync::MutexGuard<'_, QueueState>,
        pos: usize,
        id: ReportId,
        outcome: Result<(), DeliveryError>,
    ) {
        match outcome {
            Ok(()) => {
                state.slots[pos].entry.report.transition(DeliveryState::Delivered);
                state.slots.remove(pos);
                drop(state);
                self.spool_remove(id);
                faultline_debug!("report {} delivered", id);
            }
            Err(err) => {
                let attempts = {
                    let entry = &mut state.slots[pos].entry;
                    entry.attempt_count += 1;
                    entry.attempt_count
                };
                let give_up = match err {
                    DeliveryError::Permanent { .. } => true,
                    DeliveryError::Retryable { .. } => attempts >= self.max_attempts,
                };
                if give_up {
                    state.slots[pos]
                        .entry
                        .report
                        .transition(DeliveryState::FailedPermanently);
                    state.slots.remove(pos);
                    drop(state);
                    self.spool_remove(id);
                    faultline_debug!(
                        "report {} failed permanently after {} attempts: {}",
                        id,
                        attempts,
                        err
                    );
                } else {
                    let delay = backoff_delay(
                        self.backoff_base,
                        self.backoff_ceiling,
                        attempts,
                        err.retry_after(),
                    );
                    let now = SystemTime::now();
                    let slot = &mut state.slots[pos];
                    slot.attempting = false;
                    slot.entry.next_attempt_not_before =
                        Some(now.checked_add(delay).unwrap_or(now));
                    slot.entry.last_error = Some(err.to_string());
                    slot.entry.report.transition(DeliveryState::Pending);
                    slot.persisted = true;
                    let checkpoint = slot.entry.clone();
                    drop(state);
                    self.spool_store(&checkpoint);
                    faultline_debug!(
                        "report {} attempt {} failed, next attempt in {:?}: {}",
                        id,
                        attempts,
                        delay,
                        err
                    );
                }
            }
        }
        self.idle.notify_all();
    }
}

/// The exponential retry delay for the given attempt, honoring a
/// server-provided delay as a lower bound even past the ceiling.
fn backoff_delay(
    base: Duration,
    ceiling: Duration,
    attempt_count: u32,
    server: Option<Duration>,
) -> Duration {
    let shift = attempt_count.saturating_sub(1);
    let factor = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
    let backoff = base.saturating_mul(factor).min(ceiling);
    match server {
        Some(server_delay) => backoff.max(server_delay),
        None => backoff,
    }
}

fn worker_loop(shared: &QueueShared) {
    loop {
        let mut state = shared.lock_state();

        if state.shutdown {
            let leftovers: Vec<_> = state
                .slots
                .iter_mut()
                .filter(|slot| !slot.persisted)
                .map(|slot| {
                    slot.persisted = true;
                    slot.entry.clone()
                })
                .collect();
            let to_purge = std::mem::take(&mut state.purge);
            drop(state);
            for entry in &leftovers {
                shared.spool_store(entry);
            }
            for id in to_purge {
                shared.spool_remove(id);
            }
            return;
        }

        // Durability first: newly staged entries reach the spool before any
        // attempt, and even while transmit is off.
        let to_store: Vec<_> = state
            .slots
            .iter_mut()
            .filter(|slot| !slot.persisted)
            .map(|slot| {
                slot.persisted = true;
                slot.entry.clone()
            })
            .collect();
        let to_purge = std::mem::take(&mut state.purge);
        if !to_store.is_empty() || !to_purge.is_empty() {
            drop(state);
            for entry in &to_store {
                shared.spool_store(entry);
            }
            for id in to_purge {
                shared.spool_remove(id);
            }
            continue;
        }

        let now = SystemTime::now();
        if shared.transmit_enabled() {
            // Scanning from the front keeps attempts in capture order while
            // parked entries never starve newer due ones.
            if let Some(slot) = state.slots.iter_mut().find(|slot| slot.entry.is_due(now)) {
                slot.attempting = true;
                slot.entry.report.transition(DeliveryState::InFlight);
                let attempt = slot.entry.clone();
                state.in_flight = true;
                drop(state);
                shared.attempt(attempt);
                continue;
            }
        }

        shared.idle.notify_all();
        match shared.sleep_duration(&state, now) {
            Some(timeout) => {
                let _state = shared
                    .signal
                    .wait_timeout(state, timeout)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            None => {
                let _state = shared
                    .signal
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::report_from_event;
    use crate::protocol::{CaptureEvent, CaptureKind};

    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<(), DeliveryError>>>,
        sent: Mutex<Vec<ReportId>>,
    }

    impl ScriptedTransport {
        fn answering(outcomes: Vec<Result<(), DeliveryError>>) -> Arc<ScriptedTransport> {
            Arc::new(ScriptedTransport {
                script: Mutex::new(outcomes.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent_ids(&self) -> Vec<ReportId> {
            self.sent.lock().unwrap().clone()
        }

        fn attempts(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, payload: &TransportPayload) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(payload.report_id);
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    /// Holds every send until the gate opens, then succeeds.
    struct GatedTransport {
        gate: Mutex<bool>,
        opened: Condvar,
    }

    impl GatedTransport {
        fn closed() -> Arc<GatedTransport> {
            Arc::new(GatedTransport {
                gate: Mutex::new(false),
                opened: Condvar::new(),
            })
        }

        fn open(&self) {
            *self.gate.lock().unwrap() = true;
            self.opened.notify_all();
        }
    }

    impl Transport for GatedTransport {
        fn send(&self, _payload: &TransportPayload) -> Result<(), DeliveryError> {
            let mut open = self.gate.lock().unwrap();
            while !*open {
                open = self.opened.wait(open).unwrap();
            }
            Ok(())
        }
    }

    fn report(message: &str) -> CrashReport {
        report_from_event(
            CaptureEvent::new(CaptureKind::ApplicationError, message),
            &Options::default(),
            None,
            Vec::new(),
        )
    }

    fn fast_options() -> Options {
        Options {
            retry_backoff_base: Duration::from_millis(1),
            retry_backoff_ceiling: Duration::from_millis(50),
            ..Default::default()
        }
    }

    fn wait_until(limit: Duration, mut probe: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if probe() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        probe()
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        let ceiling = Duration::from_secs(300);
        assert_eq!(backoff_delay(base, ceiling, 1, None), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, ceiling, 2, None), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, ceiling, 4, None), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_caps_at_ceiling() {
        let base = Duration::from_secs(100);
        let ceiling = Duration::from_secs(300);
        assert_eq!(backoff_delay(base, ceiling, 3, None), ceiling);
        assert_eq!(backoff_delay(base, ceiling, 64, None), ceiling);
    }

    #[test]
    fn test_server_delay_superseded_only_upward() {
        let base = Duration::from_secs(1);
        let ceiling = Duration::from_secs(300);
        assert_eq!(
            backoff_delay(base, ceiling, 1, Some(Duration::from_secs(500))),
            Duration::from_secs(500)
        );
        assert_eq!(
            backoff_delay(base, ceiling, 4, Some(Duration::from_secs(1))),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_reports_deliver_in_capture_order() {
        let transport = ScriptedTransport::answering(Vec::new());
        let queue = DeliveryQueue::new(&fast_options(), transport.clone());

        let first = report("first");
        let second = report("second");
        let third = report("third");
        let expected = vec![first.id, second.id, third.id];
        queue.enqueue(first);
        queue.enqueue(second);
        queue.enqueue(third);

        assert!(queue.flush(Duration::from_secs(5)));
        assert!(wait_until(Duration::from_secs(5), || queue.entries().is_empty()));
        assert_eq!(transport.sent_ids(), expected);
    }

    #[test]
    fn test_retryable_failure_backs_off_and_recovers() {
        let transport = ScriptedTransport::answering(vec![
            Err(DeliveryError::retryable("connection reset")),
            Ok(()),
        ]);
        let queue = DeliveryQueue::new(&fast_options(), transport.clone());
        queue.enqueue(report("flaky"));

        assert!(wait_until(Duration::from_secs(5), || queue.entries().is_empty()));
        assert_eq!(transport.attempts(), 2);
    }

    #[test]
    fn test_retry_state_is_recorded() {
        let transport = ScriptedTransport::answering(vec![Err(DeliveryError::retryable_after(
            "slow down",
            Duration::from_secs(60),
        ))]);
        let queue = DeliveryQueue::new(&fast_options(), transport.clone());
        queue.enqueue(report("parked"));

        assert!(wait_until(Duration::from_secs(5), || transport.attempts() == 1));
        assert!(queue.flush(Duration::from_secs(5)));

        let entries = queue.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempt_count, 1);
        assert_eq!(entries[0].report.delivery, DeliveryState::Pending);
        assert!(entries[0].last_error.as_deref().unwrap().contains("slow down"));
        let not_before = entries[0].next_attempt_not_before.unwrap();
        assert!(not_before > SystemTime::now() + Duration::from_secs(30));
    }

    #[test]
    fn test_max_attempts_exhaustion_is_terminal() {
        let transport = ScriptedTransport::answering(vec![
            Err(DeliveryError::retryable("boom")),
            Err(DeliveryError::retryable("boom")),
            Err(DeliveryError::retryable("boom")),
        ]);
        let options = Options {
            max_attempts: 3,
            ..fast_options()
        };
        let queue = DeliveryQueue::new(&options, transport.clone());
        queue.enqueue(report("doomed"));

        assert!(wait_until(Duration::from_secs(5), || queue.entries().is_empty()));
        assert_eq!(transport.attempts(), 3);
    }

    #[test]
    fn test_permanent_failure_never_retries() {
        let transport =
            ScriptedTransport::answering(vec![Err(DeliveryError::permanent("unauthorized"))]);
        let queue = DeliveryQueue::new(&fast_options(), transport.clone());
        queue.enqueue(report("rejected"));

        assert!(wait_until(Duration::from_secs(5), || queue.entries().is_empty()));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(transport.attempts(), 1);
    }

    #[test]
    fn test_transmit_gate_parks_entries() {
        let transport = ScriptedTransport::answering(Vec::new());
        let options = Options {
            transmit: false,
            ..fast_options()
        };
        let queue = DeliveryQueue::new(&options, transport.clone());
        queue.enqueue(report("held back"));

        assert!(queue.flush(Duration::from_secs(5)));
        assert_eq!(transport.attempts(), 0);
        assert_eq!(queue.entries().len(), 1);

        queue.set_transmit(true);
        assert!(wait_until(Duration::from_secs(5), || queue.entries().is_empty()));
        assert_eq!(transport.attempts(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let transport = ScriptedTransport::answering(Vec::new());
        let options = Options {
            transmit: false,
            max_queue_size: 2,
            ..fast_options()
        };
        let queue = DeliveryQueue::new(&options, transport);

        let first = report("first");
        let second = report("second");
        let third = report("third");
        let survivors = vec![second.id, third.id];
        queue.enqueue(first);
        queue.enqueue(second);
        queue.enqueue(third);

        let staged: Vec<_> = queue.entries().iter().map(|e| e.id()).collect();
        assert_eq!(staged, survivors);
    }

    #[test]
    fn test_parked_entries_are_evictable() {
        let transport = ScriptedTransport::answering(vec![Err(DeliveryError::retryable_after(
            "slow down",
            Duration::from_secs(60),
        ))]);
        let options = Options {
            max_queue_size: 1,
            ..fast_options()
        };
        let queue = DeliveryQueue::new(&options, transport.clone());

        queue.enqueue(report("parked"));
        assert!(wait_until(Duration::from_secs(5), || transport.attempts() == 1));
        assert!(queue.flush(Duration::from_secs(5)));

        let fresh = report("fresh");
        let fresh_id = fresh.id;
        queue.enqueue(fresh);

        assert!(wait_until(Duration::from_secs(5), || queue.entries().is_empty()));
        assert_eq!(transport.attempts(), 2);
        assert_eq!(transport.sent_ids().last(), Some(&fresh_id));
    }

    #[test]
    fn test_restart_recovers_pending_entries() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options {
            transmit: false,
            spool_dir: Some(dir.path().to_path_buf()),
            ..fast_options()
        };

        let parked = report("survives restarts");
        let parked_id = parked.id;
        {
            let transport = ScriptedTransport::answering(Vec::new());
            let queue = DeliveryQueue::new(&options, transport);
            queue.enqueue(parked);
            assert!(queue.flush(Duration::from_secs(5)));
        }

        let transport = ScriptedTransport::answering(Vec::new());
        let queue = DeliveryQueue::new(&options, transport.clone());
        let recovered: Vec<_> = queue.entries().iter().map(|e| e.id()).collect();
        assert_eq!(recovered, vec![parked_id]);

        queue.set_transmit(true);
        assert!(wait_until(Duration::from_secs(5), || queue.entries().is_empty()));
        assert_eq!(transport.sent_ids(), vec![parked_id]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_recovery_drops_oldest_beyond_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options {
            transmit: false,
            spool_dir: Some(dir.path().to_path_buf()),
            ..fast_options()
        };

        let first = report("first");
        let second = report("second");
        let third = report("third");
        let kept = vec![second.id, third.id];
        {
            let queue = DeliveryQueue::new(&options, ScriptedTransport::answering(Vec::new()));
            queue.enqueue(first);
            queue.enqueue(second);
            queue.enqueue(third);
            assert!(queue.flush(Duration::from_secs(5)));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);

        let options = Options {
            max_queue_size: 2,
            ..options
        };
        let queue = DeliveryQueue::new(&options, ScriptedTransport::answering(Vec::new()));
        let recovered: Vec<_> = queue.entries().iter().map(|e| e.id()).collect();
        assert_eq!(recovered, kept);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_evictions_purge_spool_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let transport = GatedTransport::closed();
        let options = Options {
            transmit: false,
            max_queue_size: 2,
            spool_dir: Some(dir.path().to_path_buf()),
            ..fast_options()
        };
        let queue = DeliveryQueue::new(&options, transport.clone());
        let shared = queue.shared.clone();

        queue.enqueue(report("in flight at shutdown"));
        queue.enqueue(report("evicted"));
        assert!(queue.flush(Duration::from_secs(5)));

        queue.set_transmit(true);
        assert!(wait_until(Duration::from_secs(5), || shared.lock_state().in_flight));

        let survivor = report("survivor");
        let survivor_id = survivor.id;
        queue.enqueue(survivor);

        let closer = thread::spawn(move || drop(queue));
        assert!(wait_until(Duration::from_secs(5), || shared.lock_state().shutdown));
        transport.open();
        closer.join().unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let queue = DeliveryQueue::new(&options, ScriptedTransport::answering(Vec::new()));
        let recovered: Vec<_> = queue.entries().iter().map(|e| e.id()).collect();
        assert_eq!(recovered, vec![survivor_id]);
    }
}
