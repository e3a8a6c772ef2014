//! This crate provides the shared data model for the Faultline crash
//! reporting SDK.
//!
//! Everything that flows through the capture and delivery pipeline is defined
//! here: the raw [`CaptureEvent`] handed over by a capture backend, the fully
//! structured [`CrashReport`] it is converted into, the deploy correlation
//! records a report is stamped with, and the [`DeliveryQueueEntry`] that
//! wraps a report while it waits for transport.
//!
//! The types in this crate are plain data with serde implementations. All
//! pipeline behavior lives in `faultline-core`.
#![warn(missing_docs)]
#![deny(unsafe_code)]

mod report_id;

pub mod deploy;
pub mod queue;
pub mod report;
pub mod utils;

pub use crate::deploy::{DeployRecord, DeploySnapshot};
pub use crate::queue::DeliveryQueueEntry;
pub use crate::report::{
    Addr, CaptureEvent, CaptureKind, Classification, CrashReport, DeliveryState, FrameRecord,
    HostInfo, Level, Map, ParseAddrError, ParseLevelError, Person, RawFrame, TelemetryBody,
    TelemetryEvent, Value, UNKNOWN,
};
pub use crate::report_id::{ParseReportIdError, ReportId};
