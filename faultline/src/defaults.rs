use std::borrow::Cow;
use std::env;
use std::sync::Arc;

use crate::transports::DefaultTransportFactory;
use crate::Options;

/// Applies the default configuration to the given options.
///
/// This is invoked by [`init`](crate::init) before the client is created.
/// It wires up the [`DefaultTransportFactory`] when no transport was
/// configured and fills blank fields from the process environment:
///
/// * `FAULTLINE_ACCESS_TOKEN` supplies the access token.
/// * `FAULTLINE_ENDPOINT` overrides the collection endpoint.
/// * `FAULTLINE_ENVIRONMENT` supplies the environment tag.
/// * `FAULTLINE_CODE_VERSION` supplies the code version.
pub fn apply_defaults(mut opts: Options) -> Options {
    if opts.transport.is_none() {
        opts.transport = Some(Arc::new(DefaultTransportFactory));
    }
    if opts.access_token.is_none() {
        opts.access_token = env::var("FAULTLINE_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());
    }
    if let Ok(endpoint) = env::var("FAULTLINE_ENDPOINT") {
        if let Ok(endpoint) = endpoint.parse() {
            opts.endpoint = endpoint;
        }
    }
    if opts.environment == "unspecified" {
        if let Ok(environment) = env::var("FAULTLINE_ENVIRONMENT") {
            opts.environment = Cow::Owned(environment);
        }
    }
    if opts.code_version.is_none() {
        opts.code_version = env::var("FAULTLINE_CODE_VERSION").ok().map(Cow::Owned);
    }
    opts
}
