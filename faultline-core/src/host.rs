//! Machine and process facts stamped on every report.

use std::borrow::Cow;

use crate::options::Options;
use crate::protocol::HostInfo;

include!(concat!(env!("OUT_DIR"), "/constants.gen.rs"));

/// Returns the machine hostname if available.
#[cfg(not(target_arch = "wasm32"))]
fn machine_hostname() -> Option<String> {
    hostname::get().ok().and_then(|s| s.into_string().ok())
}

#[cfg(target_arch = "wasm32")]
fn machine_hostname() -> Option<String> {
    None
}

/// Collects the host facts for a report, honoring a configured hostname
/// override.
pub(crate) fn host_info(options: &Options) -> HostInfo {
    HostInfo {
        os: PLATFORM.into(),
        arch: ARCH.into(),
        hostname: options
            .host
            .clone()
            .map(Cow::into_owned)
            .or_else(machine_hostname),
        runtime_version: RUSTC_VERSION.map(str::to_owned),
    }
}
