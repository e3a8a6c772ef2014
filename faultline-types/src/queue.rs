//! The delivery queue entry.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::report::CrashReport;
use crate::report_id::ReportId;
use crate::utils::ts_seconds_float_opt;

/// A report together with its delivery bookkeeping.
///
/// This is the unit the delivery queue holds in memory and the unit the
/// spool persists, one record per file keyed by report id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryQueueEntry {
    /// The wrapped report.
    pub report: CrashReport,
    /// How many delivery attempts have been made so far.
    #[serde(default)]
    pub attempt_count: u32,
    /// The earliest time the next attempt may run. `None` means the entry is
    /// due immediately.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "ts_seconds_float_opt"
    )]
    pub next_attempt_not_before: Option<SystemTime>,
    /// Diagnostic description of the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DeliveryQueueEntry {
    /// Wraps a freshly converted report for delivery.
    pub fn new(report: CrashReport) -> DeliveryQueueEntry {
        DeliveryQueueEntry {
            report,
            attempt_count: 0,
            next_attempt_not_before: None,
            last_error: None,
        }
    }

    /// The id of the wrapped report.
    pub fn id(&self) -> ReportId {
        self.report.id
    }

    /// Whether the entry is due for a delivery attempt at `now`.
    pub fn is_due(&self, now: SystemTime) -> bool {
        match self.next_attempt_not_before {
            None => true,
            Some(not_before) => now >= not_before,
        }
    }
}
