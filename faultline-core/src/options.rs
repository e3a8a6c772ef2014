use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use url::Url;

use crate::constants::{DEFAULT_ENDPOINT, USER_AGENT};
use crate::protocol::{CrashReport, Person};
use crate::TransportFactory;

/// Type alias for the before report hook.
pub type BeforeReport = Arc<dyn Fn(CrashReport) -> Option<CrashReport> + Send + Sync>;

static DEFAULT_ENDPOINT_URL: Lazy<Url> =
    Lazy::new(|| Url::parse(DEFAULT_ENDPOINT).expect("DEFAULT_ENDPOINT is a valid URL"));

/// Configuration settings for the client.
///
/// # Examples
///
/// ```
/// let _options = faultline_core::Options {
///     debug: true,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct Options {
    /// The access token to use. If not set the client is effectively
    /// disabled: nothing is captured and nothing is queued.
    pub access_token: Option<String>,
    /// The collection endpoint reports are shipped to.
    pub endpoint: Url,
    /// The deploy environment tag reported with every report, such as
    /// `production`. (defaults to `unspecified`)
    pub environment: Cow<'static, str>,
    /// The application code version reported with every report. Usually set
    /// via [`release_version!`](crate::release_version).
    pub code_version: Option<Cow<'static, str>>,
    /// Overrides the detected hostname.
    pub host: Option<Cow<'static, str>>,
    /// The person reports concern, if the application knows one.
    pub person: Option<Person>,
    /// Master switch for the whole pipeline. When `false`, captures are
    /// skipped upstream and the queue never sees them. (defaults to true)
    pub enabled: bool,
    /// Whether queued reports are actually sent. When `false`, reports are
    /// captured and queued but delivery attempts are suspended until the
    /// flag is flipped back through `Client::set_transmit`. (defaults to true)
    pub transmit: bool,
    /// The sample rate for capture. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// Attaches the current stack to application error captures that carry
    /// no stack of their own. (defaults to false)
    pub attach_stacktrace: bool,
    /// Maximum number of reports held in the delivery queue. When full, the
    /// oldest pending entry is evicted first. (defaults to 100)
    pub max_queue_size: usize,
    /// Maximum number of delivery attempts per report before it is marked
    /// failed permanently. (defaults to 5)
    pub max_attempts: u32,
    /// Base delay of the exponential retry backoff. (defaults to 1s)
    pub retry_backoff_base: Duration,
    /// Ceiling of the exponential retry backoff. (defaults to 5m)
    pub retry_backoff_ceiling: Duration,
    /// Maximum number of telemetry events kept in the in-memory ring and
    /// attached to reports. (defaults to 10)
    pub max_telemetry_events: usize,
    /// Directory where queued reports are spooled so that they survive a
    /// restart. Spooling is disabled when unset.
    pub spool_dir: Option<PathBuf>,
    /// Whether `init` installs the panic hook capture backend.
    /// (defaults to true)
    pub capture_panics: bool,
    /// The timeout on client drop for draining queued reports on shutdown.
    /// (defaults to 2s)
    pub shutdown_timeout: Duration,
    /// Enables debug mode.
    ///
    /// In debug mode debug information is printed to stderr to help you
    /// understand what faultline is doing. When the `debug-logs` feature is
    /// enabled, faultline will instead log to the `faultline` logger
    /// independently of this flag with the `Debug` level.
    pub debug: bool,
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the options by
    /// reference and returning a `Transport`, a boxed `Arc<Transport>` or
    /// alternatively the `DefaultTransportFactory`.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// Callback that is executed before a report is queued for delivery.
    ///
    /// Returning `None` discards the report.
    pub before_report: Option<BeforeReport>,
    /// The user agent that should be reported.
    pub user_agent: Cow<'static, str>,
}

impl Options {
    /// Creates new Options.
    pub fn new() -> Options {
        Options::default()
    }

    /// Whether this configuration yields a working client.
    ///
    /// A client is enabled when the master switch is on and an access token
    /// is configured.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.access_token.is_some()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct TransportFactory;
        #[derive(Debug)]
        struct BeforeReport;
        let before_report = self.before_report.as_ref().map(|_| BeforeReport);

        f.debug_struct("Options")
            .field("access_token", &self.access_token)
            .field("endpoint", &self.endpoint.as_str())
            .field("environment", &self.environment)
            .field("code_version", &self.code_version)
            .field("host", &self.host)
            .field("person", &self.person)
            .field("enabled", &self.enabled)
            .field("transmit", &self.transmit)
            .field("sample_rate", &self.sample_rate)
            .field("attach_stacktrace", &self.attach_stacktrace)
            .field("max_queue_size", &self.max_queue_size)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_base", &self.retry_backoff_base)
            .field("retry_backoff_ceiling", &self.retry_backoff_ceiling)
            .field("max_telemetry_events", &self.max_telemetry_events)
            .field("spool_dir", &self.spool_dir)
            .field("capture_panics", &self.capture_panics)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("debug", &self.debug)
            .field("transport", &TransportFactory)
            .field("before_report", &before_report)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for Options {
    fn default() -> Options {
        Options {
            access_token: None,
            endpoint: DEFAULT_ENDPOINT_URL.clone(),
            environment: Cow::Borrowed("unspecified"),
            code_version: None,
            host: None,
            person: None,
            enabled: true,
            transmit: true,
            sample_rate: 1.0,
            attach_stacktrace: false,
            max_queue_size: 100,
            max_attempts: 5,
            retry_backoff_base: Duration::from_secs(1),
            retry_backoff_ceiling: Duration::from_secs(300),
            max_telemetry_events: 10,
            spool_dir: None,
            capture_panics: true,
            shutdown_timeout: Duration::from_secs(2),
            debug: false,
            transport: None,
            before_report: None,
            user_agent: Cow::Borrowed(USER_AGENT),
        }
    }
}

impl From<(String, Options)> for Options {
    fn from((access_token, mut opts): (String, Options)) -> Options {
        opts.access_token = if access_token.is_empty() {
            None
        } else {
            Some(access_token)
        };
        opts
    }
}

impl From<(&str, Options)> for Options {
    fn from((access_token, opts): (&str, Options)) -> Options {
        (access_token.to_owned(), opts).into()
    }
}

impl From<String> for Options {
    fn from(access_token: String) -> Options {
        (access_token, Options::default()).into()
    }
}

impl From<&str> for Options {
    fn from(access_token: &str) -> Options {
        (access_token.to_owned(), Options::default()).into()
    }
}

impl From<()> for Options {
    fn from(_: ()) -> Options {
        Options::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_disables_client() {
        let opts: Options = "".into();
        assert_eq!(opts.access_token, None);
        assert!(!opts.is_enabled());

        let opts: Options = "token123".into();
        assert_eq!(opts.access_token.as_deref(), Some("token123"));
        assert!(opts.is_enabled());
    }

    #[test]
    fn test_token_with_options() {
        let opts: Options = (
            "token123",
            Options {
                debug: true,
                ..Default::default()
            },
        )
            .into();
        assert_eq!(opts.access_token.as_deref(), Some("token123"));
        assert!(opts.debug);
    }

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert_eq!(opts.environment, "unspecified");
        assert_eq!(opts.sample_rate, 1.0);
        assert_eq!(opts.max_queue_size, 100);
        assert_eq!(opts.max_attempts, 5);
        assert!(opts.transmit);
        assert!(opts.enabled);
        assert!(!opts.is_enabled());
    }
}
