//! Conversion of raw captures into queued crash reports.

use std::borrow::Cow;

use crate::backtrace_support::resolve_stack;
use crate::host;
use crate::options::Options;
use crate::protocol::{
    CaptureEvent, CaptureKind, Classification, CrashReport, DeliveryState, DeploySnapshot, Level,
    Map, ReportId, TelemetryEvent, UNKNOWN,
};

/// Severity assigned when the capture itself does not carry one.
fn default_level(kind: CaptureKind) -> Level {
    match kind {
        CaptureKind::Signal => Level::Critical,
        CaptureKind::NativeException | CaptureKind::ApplicationError => Level::Error,
    }
}

fn or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN.into(),
    }
}

fn thread_key(event: &CaptureEvent) -> String {
    if !event.thread_id.is_empty() {
        event.thread_id.clone()
    } else if let Some(name) = &event.thread_name {
        name.clone()
    } else {
        UNKNOWN.into()
    }
}

/// Converts a capture into a report.
///
/// The conversion is total: captures with missing pieces produce reports
/// with explicit [`UNKNOWN`] markers rather than failing. Configuration
/// facts, the current deploy and the telemetry timeline are stamped here,
/// at capture time, so later configuration changes never rewrite a report
/// that is already queued.
pub(crate) fn report_from_event(
    event: CaptureEvent,
    options: &Options,
    deploy: Option<DeploySnapshot>,
    telemetry: Vec<TelemetryEvent>,
) -> CrashReport {
    let stack_trace = resolve_stack(&event.native_stack);
    let mut thread_snapshots = Map::new();
    thread_snapshots.insert(thread_key(&event), stack_trace.clone());

    CrashReport {
        id: ReportId::next(),
        occurred_at: event.timestamp,
        level: event.level.unwrap_or_else(|| default_level(event.kind)),
        classification: Classification {
            kind: event.kind,
            name: or_unknown(event.name),
        },
        message: if event.reason.is_empty() {
            UNKNOWN.into()
        } else {
            event.reason
        },
        stack_trace,
        thread_snapshots,
        environment: options.environment.clone().into_owned(),
        code_version: options.code_version.clone().map(Cow::into_owned),
        host: host::host_info(options),
        deploy,
        person: options.person.clone(),
        telemetry,
        custom: event.custom,
        delivery: DeliveryState::Pending,
        delivered_at: None,
    }
}
