//! The provided transports.
//!
//! This module exposes all transports that are compiled into the faultline
//! crate. The `reqwest` feature turns on the HTTP transport.

use std::sync::Arc;

#[cfg(feature = "reqwest")]
use std::time::{Duration, SystemTime};

#[cfg(feature = "reqwest")]
use httpdate::parse_http_date;
#[cfg(feature = "reqwest")]
use reqwest::blocking::Client as ReqwestClient;
#[cfg(feature = "reqwest")]
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
#[cfg(feature = "reqwest")]
use reqwest::StatusCode;

#[cfg(feature = "reqwest")]
use crate::{DeliveryError, TransportPayload};
use crate::{Options, Transport, TransportFactory};

/// The header carrying the project access token.
#[cfg(feature = "reqwest")]
const ACCESS_TOKEN_HEADER: &str = "X-Faultline-Access-Token";

/// A [`Transport`] that ships reports via the [`reqwest`] library.
///
/// When the `transport` feature is enabled this will currently be the
/// default transport. This is separately enabled by the `reqwest` feature
/// flag.
///
/// [`reqwest`]: https://crates.io/crates/reqwest
#[cfg(feature = "reqwest")]
pub struct ReqwestHttpTransport {
    client: ReqwestClient,
    url: String,
    access_token: String,
    user_agent: String,
}

#[cfg(feature = "reqwest")]
impl ReqwestHttpTransport {
    /// Creates a new Transport.
    pub fn new(options: &Options) -> Self {
        Self::new_internal(options, None)
    }

    /// Creates a new Transport that uses the specified [`ReqwestClient`].
    pub fn with_client(options: &Options, client: ReqwestClient) -> Self {
        Self::new_internal(options, Some(client))
    }

    fn new_internal(options: &Options, client: Option<ReqwestClient>) -> Self {
        ReqwestHttpTransport {
            client: client.unwrap_or_else(ReqwestClient::new),
            url: options.endpoint.to_string(),
            access_token: options.access_token.clone().unwrap_or_default(),
            user_agent: options.user_agent.to_string(),
        }
    }
}

#[cfg(feature = "reqwest")]
impl Transport for ReqwestHttpTransport {
    fn send(&self, payload: &TransportPayload) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.body.clone())
            .send()
            .map_err(|err| DeliveryError::retryable(format!("failed to send report: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|header| header.to_str().ok())
            .and_then(parse_retry_after);

        if status == StatusCode::TOO_MANY_REQUESTS {
            Err(match retry_after {
                Some(delay) => {
                    DeliveryError::retryable_after(format!("rate limited: {status}"), delay)
                }
                None => DeliveryError::retryable(format!("rate limited: {status}")),
            })
        } else if status.is_server_error() {
            Err(DeliveryError::retryable(format!("server error: {status}")))
        } else {
            Err(DeliveryError::permanent(format!("report rejected: {status}")))
        }
    }
}

/// Parses a `Retry-After` header, which is either delay seconds or an HTTP
/// date.
#[cfg(feature = "reqwest")]
fn parse_retry_after(header: &str) -> Option<Duration> {
    if let Ok(value) = header.parse::<f64>() {
        Some(Duration::from_secs(value.ceil() as u64))
    } else if let Ok(date) = parse_http_date(header) {
        date.duration_since(SystemTime::now()).ok()
    } else {
        None
    }
}

#[cfg(feature = "reqwest")]
type DefaultTransport = ReqwestHttpTransport;

/// The default http transport.
#[cfg(feature = "reqwest")]
pub type HttpTransport = DefaultTransport;

/// Creates the default HTTP transport.
///
/// This is the default value for `transport` on the client options. It
/// creates an `HttpTransport`. If no http transport was compiled into the
/// crate it will panic on transport creation.
#[derive(Clone)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create_transport(&self, options: &Options) -> Arc<dyn Transport> {
        #[cfg(feature = "reqwest")]
        {
            Arc::new(HttpTransport::new(options))
        }
        #[cfg(not(feature = "reqwest"))]
        {
            let _ = options;
            panic!("faultline crate was compiled without transport")
        }
    }
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after("60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after("0.5"), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_retry_after_http_date() {
        let date = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(90));
        let delay = parse_retry_after(&date).unwrap();
        assert!(delay <= Duration::from_secs(90));
        assert!(delay > Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_garbage() {
        assert_eq!(parse_retry_after("next tuesday"), None);
    }
}
