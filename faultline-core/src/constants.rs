/// The version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The default collection endpoint reports are shipped to.
pub const DEFAULT_ENDPOINT: &str = "https://api.faultline.dev/v1/reports";

/// The user agent the SDK reports to the collection endpoint.
pub const USER_AGENT: &str = concat!("faultline.rust/", env!("CARGO_PKG_VERSION"));
