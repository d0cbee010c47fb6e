//! Fetches tenant descriptors over HTTP.

use futures::future::BoxFuture;
use reqwest::{Client, header};

use crate::types::{TenantDescriptor, TenantKey};

use super::candidates::BaseUrl;
use super::{FetchError, FetchTenant};

/// The path below an API base at which tenants are looked up by code.
pub const DEFAULT_RESOLVE_PATH: &str = "api/v1/tenants/by-code";

/// The user agent sent along with every lookup.
pub const USER_AGENT: &str = concat!("tenant-resolver/", env!("CARGO_PKG_VERSION"));

/// Fetcher implementation that looks up tenants with `GET {base}/{resolve_path}/{code}`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    resolve_path: String,
}

impl HttpFetcher {
    pub fn new(client: Client, resolve_path: impl Into<String>) -> Self {
        Self {
            client,
            resolve_path: resolve_path.into(),
        }
    }

    async fn fetch_descriptor(
        &self,
        base: &BaseUrl,
        key: &TenantKey,
    ) -> Result<TenantDescriptor, FetchError> {
        let url = base
            .resolve_url(&self.resolve_path, key)
            .ok_or(FetchError::UnaddressableKey)?;

        tracing::trace!("Fetching tenant descriptor from `{}`", url);

        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| FetchError::Malformed(err.to_string()))
    }
}

impl FetchTenant for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        base: &'a BaseUrl,
        key: &'a TenantKey,
    ) -> BoxFuture<'a, Result<TenantDescriptor, FetchError>> {
        Box::pin(self.fetch_descriptor(base, key))
    }
}
