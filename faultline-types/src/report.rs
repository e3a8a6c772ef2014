//! The report data model.
//!
//! A capture backend hands the pipeline a [`CaptureEvent`], the raw facts of
//! an interception. Conversion turns that into a [`CrashReport`], the fully
//! structured record that is queued, persisted and eventually shipped to the
//! collection endpoint. Conversion is total: fields that cannot be
//! determined are filled with the explicit [`UNKNOWN`] marker instead of
//! being dropped.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deploy::DeploySnapshot;
use crate::report_id::ReportId;
use crate::utils::{ts_seconds_float, ts_seconds_float_opt};

/// An alias for the map type used in reports.
pub mod map {
    pub use std::collections::btree_map::{BTreeMap as Map, *};
}

/// An alias for the values in custom report payloads.
pub mod value {
    pub use serde_json::value::{from_value, to_value, Index, Map, Number, Value};
}

pub use self::map::Map;
pub use self::value::Value;

/// Marker used for report fields whose value could not be determined.
///
/// Conversion never drops a field silently; a missing classification name,
/// thread id or host attribute is recorded as this marker so that gaps are
/// visible downstream.
pub const UNKNOWN: &str = "<unknown>";

/// Severity of a report or telemetry event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Very spammy debug information.
    Debug,
    /// Informational messages.
    Info,
    /// A warning.
    Warning,
    /// An error.
    #[default]
    Error,
    /// A fatal condition, such as a crash or uncaught exception.
    Critical,
}

/// Raised if a level cannot be parsed from a string.
#[derive(Debug, Error)]
#[error("invalid level")]
pub struct ParseLevelError;

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(string: &str) -> Result<Level, ParseLevelError> {
        Ok(match string {
            "debug" => Level::Debug,
            "info" | "log" => Level::Info,
            "warning" | "warn" => Level::Warning,
            "error" => Level::Error,
            "critical" | "fatal" => Level::Critical,
            _ => return Err(ParseLevelError),
        })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Level::Debug => write!(f, "debug"),
            Level::Info => write!(f, "info"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
            Level::Critical => write!(f, "critical"),
        }
    }
}

impl Level {
    /// A quick way to check if the level is `debug`.
    pub fn is_debug(&self) -> bool {
        *self == Level::Debug
    }

    /// A quick way to check if the level is `critical`.
    pub fn is_critical(&self) -> bool {
        *self == Level::Critical
    }
}

/// Raised if an instruction address cannot be parsed from a string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid instruction address")]
pub struct ParseAddrError;

/// An instruction address, rendered as a hex string on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Addr(pub u64);

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Addr {
    fn from(addr: u64) -> Addr {
        Addr(addr)
    }
}

impl From<Addr> for String {
    fn from(addr: Addr) -> String {
        addr.to_string()
    }
}

impl From<Addr> for u64 {
    fn from(addr: Addr) -> u64 {
        addr.0
    }
}

impl FromStr for Addr {
    type Err = ParseAddrError;

    fn from_str(s: &str) -> Result<Addr, ParseAddrError> {
        let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
        let digits = stripped.unwrap_or(s);
        if digits.is_empty() {
            return Err(ParseAddrError);
        }
        u64::from_str_radix(digits, 16).map(Addr).map_err(|_| ParseAddrError)
    }
}

impl TryFrom<String> for Addr {
    type Error = ParseAddrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The origin of a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureKind {
    /// A fatal signal trapped by a platform capture backend.
    Signal,
    /// A native runtime exception, such as a panic.
    NativeException,
    /// An error reported by application code.
    ApplicationError,
}

impl CaptureKind {
    /// Whether this kind of capture terminates the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureKind::Signal)
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CaptureKind::Signal => write!(f, "signal"),
            CaptureKind::NativeException => write!(f, "native-exception"),
            CaptureKind::ApplicationError => write!(f, "application-error"),
        }
    }
}

/// A single opaque frame as produced by a capture backend.
///
/// Raw frames carry whatever the backend could cheaply collect, usually an
/// instruction address and sometimes a mangled symbol. Symbolication beyond
/// local symbol cleanup happens server side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    /// The instruction address of the frame, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<Addr>,
    /// The raw symbol name of the frame, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// The raw facts of one interception, as handed over by a capture backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// What kind of abnormal condition was captured.
    pub kind: CaptureKind,
    /// The symbolic name of the condition (signal name, panic payload type,
    /// error type), if the backend could determine one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human readable cause.
    pub reason: String,
    /// The native stack at the point of capture.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native_stack: Vec<RawFrame>,
    /// When the capture happened.
    #[serde(default = "SystemTime::now", with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// Identity of the thread the capture happened on.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thread_id: String,
    /// Name of the thread the capture happened on, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    /// Severity override. When absent, conversion picks a level from the
    /// capture kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    /// Freeform payload to carry into the resulting report.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
}

impl CaptureEvent {
    /// Creates a capture event with the given kind and reason, timestamped
    /// now.
    pub fn new(kind: CaptureKind, reason: impl Into<String>) -> CaptureEvent {
        CaptureEvent {
            kind,
            name: None,
            reason: reason.into(),
            native_stack: Vec::new(),
            timestamp: SystemTime::now(),
            thread_id: String::new(),
            thread_name: None,
            level: None,
            custom: Map::new(),
        }
    }
}

/// A structured frame of a report stack trace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// The instruction address, kept for server side symbolication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<Addr>,
    /// The raw symbol as captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// The demangled and cleaned function name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// The source file, if it could be resolved locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// The source line, if it could be resolved locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
}

/// What a report is about: the capture kind plus a symbolic name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// The capture kind the report originated from.
    pub kind: CaptureKind,
    /// The symbolic name, such as `SIGSEGV`, `panic` or an error type. Set
    /// to [`UNKNOWN`] when the backend could not determine one.
    pub name: String,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// The person the report concerns, if the application knows one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Stable identifier of the person.
    pub id: String,
    /// Username of the person.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Email of the person.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Person {
    /// Creates a person record with just an id.
    pub fn new(id: impl Into<String>) -> Person {
        Person {
            id: id.into(),
            username: None,
            email: None,
        }
    }
}

/// The payload of a telemetry event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TelemetryBody {
    /// A log line recorded by the application.
    Log {
        /// The log message.
        message: String,
    },
    /// A non-captured error the application wants in the timeline.
    Error {
        /// The error message.
        message: String,
    },
    /// A navigation step, such as a screen or route change.
    Navigation {
        /// Where the navigation started.
        from: String,
        /// Where the navigation ended.
        to: String,
    },
    /// An outgoing network call.
    Network {
        /// The request method.
        method: String,
        /// The request URL.
        url: String,
        /// The response status code, if the call completed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
    /// Freeform data recorded by the application.
    Manual {
        /// The recorded data.
        data: Map<String, Value>,
    },
}

/// One entry of the telemetry timeline attached to reports.
///
/// Telemetry events are kept in a bounded in-memory ring and a snapshot of
/// the ring is attached to every report at conversion time, giving each
/// report a short history of what the application did before the capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Severity of the event.
    #[serde(default)]
    pub level: Level,
    /// The subsystem that recorded the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The event payload.
    #[serde(flatten)]
    pub body: TelemetryBody,
    /// When the event was recorded.
    #[serde(default = "SystemTime::now", with = "ts_seconds_float")]
    pub timestamp: SystemTime,
}

impl TelemetryEvent {
    fn with_body(level: Level, body: TelemetryBody) -> TelemetryEvent {
        TelemetryEvent {
            level,
            source: None,
            body,
            timestamp: SystemTime::now(),
        }
    }

    /// Creates a log telemetry event.
    pub fn log(message: impl Into<String>) -> TelemetryEvent {
        TelemetryEvent::with_body(
            Level::Info,
            TelemetryBody::Log {
                message: message.into(),
            },
        )
    }

    /// Creates an error telemetry event.
    pub fn error(message: impl Into<String>) -> TelemetryEvent {
        TelemetryEvent::with_body(
            Level::Error,
            TelemetryBody::Error {
                message: message.into(),
            },
        )
    }

    /// Creates a navigation telemetry event.
    pub fn navigation(from: impl Into<String>, to: impl Into<String>) -> TelemetryEvent {
        TelemetryEvent::with_body(
            Level::Info,
            TelemetryBody::Navigation {
                from: from.into(),
                to: to.into(),
            },
        )
    }

    /// Creates a network telemetry event.
    pub fn network(
        method: impl Into<String>,
        url: impl Into<String>,
        status_code: Option<u16>,
    ) -> TelemetryEvent {
        TelemetryEvent::with_body(
            Level::Info,
            TelemetryBody::Network {
                method: method.into(),
                url: url.into(),
                status_code,
            },
        )
    }
}

/// Facts about the machine and process a report was captured on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Operating system name, [`UNKNOWN`] when undeterminable.
    #[serde(default)]
    pub os: String,
    /// Processor architecture, [`UNKNOWN`] when undeterminable.
    #[serde(default)]
    pub arch: String,
    /// Hostname of the machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Version of the language runtime the process runs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
}

/// Where a report is in its delivery lifecycle.
///
/// Transitions are one way: pending to in-flight to a terminal state. The
/// single exception is in-flight back to pending when an attempt failed
/// retryably. [`DeliveryState::can_transition`] encodes exactly this.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryState {
    /// Waiting for a delivery attempt.
    #[default]
    Pending,
    /// A delivery attempt is in progress.
    InFlight,
    /// The collection endpoint accepted the report.
    Delivered,
    /// Delivery was abandoned, either after exhausting all attempts or on a
    /// non-retryable failure.
    FailedPermanently,
}

impl DeliveryState {
    /// Whether the state is a terminal outcome.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::FailedPermanently)
    }

    /// Whether a transition from this state to `next` is allowed.
    pub fn can_transition(self, next: DeliveryState) -> bool {
        matches!(
            (self, next),
            (DeliveryState::Pending, DeliveryState::InFlight)
                | (DeliveryState::InFlight, DeliveryState::Pending)
                | (DeliveryState::InFlight, DeliveryState::Delivered)
                | (DeliveryState::InFlight, DeliveryState::FailedPermanently)
        )
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DeliveryState::Pending => write!(f, "pending"),
            DeliveryState::InFlight => write!(f, "in-flight"),
            DeliveryState::Delivered => write!(f, "delivered"),
            DeliveryState::FailedPermanently => write!(f, "failed-permanently"),
        }
    }
}

/// A fully structured crash or error report.
///
/// This is the unit that is queued, spooled and shipped. Reports are built
/// by conversion from a [`CaptureEvent`] and are immutable afterwards except
/// for their delivery lifecycle fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrashReport {
    /// Identity of the report, unique within the process lifetime.
    pub id: ReportId,
    /// When the underlying capture happened.
    #[serde(with = "ts_seconds_float")]
    pub occurred_at: SystemTime,
    /// What the report is about.
    pub classification: Classification,
    /// Severity of the report.
    #[serde(default)]
    pub level: Level,
    /// Human readable message, [`UNKNOWN`] when the capture carried none.
    pub message: String,
    /// The stack of the capturing thread.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<FrameRecord>,
    /// Stacks of other threads, keyed by thread identity.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub thread_snapshots: Map<String, Vec<FrameRecord>>,
    /// The configured deploy environment tag, such as `production`.
    #[serde(default)]
    pub environment: String,
    /// The configured application code version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_version: Option<String>,
    /// Machine and process facts.
    #[serde(default)]
    pub host: HostInfo,
    /// Value copy of the deploy record that was current at capture time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeploySnapshot>,
    /// The configured person, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
    /// Snapshot of the telemetry timeline at capture time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub telemetry: Vec<TelemetryEvent>,
    /// Freeform payload attached by the application.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
    /// Where the report is in its delivery lifecycle.
    #[serde(default)]
    pub delivery: DeliveryState,
    /// When the collection endpoint accepted the report.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "ts_seconds_float_opt")]
    pub delivered_at: Option<SystemTime>,
}

impl CrashReport {
    /// Applies a delivery state transition if it is allowed, returning
    /// whether the transition was applied.
    ///
    /// Reaching [`DeliveryState::Delivered`] stamps [`CrashReport::delivered_at`].
    pub fn transition(&mut self, next: DeliveryState) -> bool {
        if !self.delivery.can_transition(next) {
            return false;
        }
        self.delivery = next;
        if next == DeliveryState::Delivered {
            self.delivered_at = Some(SystemTime::now());
        }
        true
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("debug", Level::Debug)]
    #[case("info", Level::Info)]
    #[case("log", Level::Info)]
    #[case("warning", Level::Warning)]
    #[case("warn", Level::Warning)]
    #[case("error", Level::Error)]
    #[case("critical", Level::Critical)]
    #[case("fatal", Level::Critical)]
    fn test_level_parsing(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(input.parse::<Level>().unwrap(), expected);
    }

    #[test]
    fn test_level_rejects_garbage() {
        assert!("catastrophic".parse::<Level>().is_err());
    }

    #[test]
    fn test_addr_round_trip() {
        let addr: Addr = "0x7f3a9c04d210".parse().unwrap();
        assert_eq!(addr, Addr(0x7f3a_9c04_d210));
        assert_eq!(addr.to_string(), "0x7f3a9c04d210");
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"0x7f3a9c04d210\"");
        assert_eq!(
            serde_json::from_str::<Addr>("\"0x7f3a9c04d210\"").unwrap(),
            addr
        );
        assert!("".parse::<Addr>().is_err());
        assert!("0xzz".parse::<Addr>().is_err());
    }

    #[test]
    fn test_delivery_transitions() {
        use DeliveryState::*;

        assert!(Pending.can_transition(InFlight));
        assert!(InFlight.can_transition(Pending));
        assert!(InFlight.can_transition(Delivered));
        assert!(InFlight.can_transition(FailedPermanently));

        assert!(!Pending.can_transition(Delivered));
        assert!(!Delivered.can_transition(Pending));
        assert!(!Delivered.can_transition(InFlight));
        assert!(!FailedPermanently.can_transition(Pending));
        assert!(!FailedPermanently.can_transition(Delivered));
    }

    #[test]
    fn test_capture_kind_wire_format() {
        assert_eq!(
            serde_json::to_string(&CaptureKind::NativeException).unwrap(),
            "\"native-exception\""
        );
        assert_eq!(
            serde_json::from_str::<CaptureKind>("\"application-error\"").unwrap(),
            CaptureKind::ApplicationError
        );
    }

    #[test]
    fn test_telemetry_wire_format() {
        let event = TelemetryEvent {
            timestamp: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
            ..TelemetryEvent::navigation("home", "settings")
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            "{\"level\":\"info\",\"type\":\"navigation\",\"from\":\"home\",\
             \"to\":\"settings\",\"timestamp\":1700000000}"
        );
    }

    #[test]
    fn test_report_round_trip() {
        let mut custom = Map::new();
        custom.insert("request_id".into(), Value::from("f3a1"));
        custom.insert("attempt".into(), Value::from(3));
        let report = CrashReport {
            id: ReportId::next(),
            occurred_at: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
            classification: Classification {
                kind: CaptureKind::NativeException,
                name: "panic".into(),
            },
            level: Level::Error,
            message: "lost a wheel".into(),
            stack_trace: vec![FrameRecord {
                instruction_addr: Some(Addr(0x7f3a_9c04_d210)),
                symbol: Some("_ZN4core9panicking5panic17h1c9fc5b2a3e7f8d2E".into()),
                function: Some("core::panicking::panic".into()),
                filename: Some("library/core/src/panicking.rs".into()),
                lineno: Some(148),
            }],
            thread_snapshots: Map::new(),
            environment: "production".into(),
            code_version: Some("1.4.2".into()),
            host: HostInfo {
                os: "linux".into(),
                arch: "x86_64".into(),
                hostname: Some("worker-7".into()),
                runtime_version: Some("rustc 1.81.0".into()),
            },
            deploy: None,
            person: Some(Person::new("user-1")),
            telemetry: vec![TelemetryEvent {
                timestamp: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_699_999_990),
                ..TelemetryEvent::log("settings opened")
            }],
            custom,
            delivery: DeliveryState::Pending,
            delivered_at: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(serde_json::from_str::<CrashReport>(&json).unwrap(), report);
    }
}
