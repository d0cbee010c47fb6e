use std::time::Duration;

use crate::config::Config;

/// Timeouts for requests to the tenant API.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResolveTimeouts {
    /// The timeout for establishing a connection.
    pub connect: Duration,
    /// Timeout for one request to a single candidate endpoint.
    pub request: Duration,
}

impl ResolveTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect: config.connect_timeout,
            request: config.resolve_timeout,
        }
    }
}

impl Default for ResolveTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Duration::from_secs(15),
        }
    }
}

/// Creates a [`reqwest::Client`] for talking to the tenant API.
///
/// The client does not keep a cookie store, so no credentials are sent along with lookups. It
/// only applies the connect timeout, the request timeout is enforced per candidate by the
/// resolver.
pub fn create_client(timeouts: &ResolveTimeouts) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .connect_timeout(timeouts.connect)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}
