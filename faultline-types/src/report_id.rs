use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised if a report ID cannot be parsed from a string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseReportIdError {
    /// Raised if the value does not have the `<millis>-<seq>` shape.
    #[error("invalid value for report id")]
    InvalidValue,
    /// Raised if an empty value is parsed.
    #[error("empty or missing report id")]
    EmptyValue,
}

/// Identity of a single report, unique within the process lifetime.
///
/// An id is the pair of the capture wall-clock time in milliseconds and a
/// process-wide monotonic sequence number. Two reports captured in the same
/// millisecond still get distinct ids, and ids order by capture time first,
/// sequence second. The string form is `<millis>-<seq>`; ordering is defined
/// on the parsed pair, with both fields zero padded wide enough that spool
/// file listings sort in the same order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ReportId {
    millis: u64,
    seq: u64,
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl ReportId {
    /// Creates a report id from its raw parts.
    pub fn from_parts(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// Allocates the next report id.
    ///
    /// The sequence number is taken from a process-wide counter, so ids
    /// handed out by this function never collide even when the clock stands
    /// still or steps backwards.
    pub fn next() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self { millis, seq }
    }

    /// Returns the capture time encoded in this id.
    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.millis)
    }

    /// Returns the sequence number encoded in this id.
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:013}-{:010}", self.millis, self.seq)
    }
}

impl From<ReportId> for String {
    fn from(id: ReportId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ReportId {
    type Error = ParseReportIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for ReportId {
    type Err = ParseReportIdError;

    fn from_str(s: &str) -> Result<ReportId, ParseReportIdError> {
        if s.is_empty() {
            return Err(ParseReportIdError::EmptyValue);
        }

        let (millis, seq) = s.split_once('-').ok_or(ParseReportIdError::InvalidValue)?;
        match (millis.parse::<u64>(), seq.parse::<u64>()) {
            (Ok(millis), Ok(seq)) => Ok(ReportId { millis, seq }),
            _ => Err(ParseReportIdError::InvalidValue),
        }
    }
}
