//! Builds the ordered list of equivalent API endpoints to try.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::types::TenantKey;

/// The port the tenant API listens on when its base is inferred from the page origin.
pub const DEFAULT_API_PORT: u16 = 8101;

/// The API base used when neither a configured base nor a page origin is available.
pub const DEFAULT_API_BASE: &str = "http://localhost:8101";

const LOOPBACK_ALIASES: [(&str, &str); 2] = [("localhost", "127.0.0.1"), ("127.0.0.1", "localhost")];

/// Provides the network origin of the hosting page, if there is one.
///
/// This is injected into the [`CandidateBuilder`] instead of reading any global state.
pub trait PageOrigin: Send + Sync {
    fn origin(&self) -> Option<Url>;
}

impl PageOrigin for Option<Url> {
    fn origin(&self) -> Option<Url> {
        self.clone()
    }
}

/// A base URL that resolve paths can be appended to.
///
/// Trailing slashes are insignificant, and the URL is displayed without them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Creates a base from `url`, or `None` if the URL cannot carry a path.
    pub fn new(url: Url) -> Option<Self> {
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return None;
        }
        Some(Self(url))
    }

    pub fn host_str(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Returns the full URL to resolve `key` below `path`.
    ///
    /// The key is appended as a single, percent-encoded path segment. Returns `None` for the keys
    /// `.` and `..`, which URLs treat as relative path navigation even when percent-encoded.
    pub fn resolve_url(&self, path: &str, key: &TenantKey) -> Option<Url> {
        if matches!(key.as_str(), "." | "..") {
            return None;
        }

        let mut url = self.0.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()))
                .push(key.as_str());
        }
        Some(url)
    }

    /// Returns this base with its loopback alias swapped, if the host is a loopback alias.
    fn loopback_alias(&self) -> Option<Self> {
        let host = self.host_str()?;
        let (_, alias) = LOOPBACK_ALIASES.iter().find(|(from, _)| *from == host)?;
        let mut url = self.0.clone();
        url.set_host(Some(alias)).ok()?;
        Some(Self(url))
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

/// Derives the candidate API bases for one resolution attempt.
///
/// The configured base is taken from, in order:
/// - the explicitly configured `api_base`,
/// - the page origin, with its port replaced by the `inferred_port`,
/// - [`DEFAULT_API_BASE`].
#[derive(Clone)]
pub struct CandidateBuilder {
    api_base: Option<Url>,
    inferred_port: u16,
    page_origin: Arc<dyn PageOrigin>,
}

impl fmt::Debug for CandidateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateBuilder")
            .field("api_base", &self.api_base)
            .field("inferred_port", &self.inferred_port)
            .finish_non_exhaustive()
    }
}

impl Default for CandidateBuilder {
    fn default() -> Self {
        Self::new(None, Arc::new(None::<Url>))
    }
}

impl CandidateBuilder {
    pub fn new(api_base: Option<Url>, page_origin: Arc<dyn PageOrigin>) -> Self {
        Self {
            api_base,
            inferred_port: DEFAULT_API_PORT,
            page_origin,
        }
    }

    pub fn with_inferred_port(mut self, port: u16) -> Self {
        self.inferred_port = port;
        self
    }

    /// Returns the single configured base, before any alias expansion.
    pub fn configured_base(&self) -> BaseUrl {
        if let Some(api_base) = &self.api_base {
            match BaseUrl::new(api_base.clone()) {
                Some(base) => return base,
                None => tracing::warn!(%api_base, "Ignoring API base that cannot carry a path"),
            }
        }

        self.inferred_base().unwrap_or_else(default_base)
    }

    fn inferred_base(&self) -> Option<BaseUrl> {
        let mut url = self.page_origin.origin()?;
        url.set_port(Some(self.inferred_port)).ok()?;
        url.set_path("");
        url.set_query(None);
        url.set_fragment(None);
        BaseUrl::new(url)
    }

    /// Builds the ordered list of candidates. The list is never empty.
    ///
    /// The configured base comes first. If its host is `localhost` or `127.0.0.1`, the same base
    /// with the other alias follows.
    pub fn build(&self) -> Vec<BaseUrl> {
        let base = self.configured_base();
        let mut candidates = vec![base.clone()];
        if let Some(alias) = base.loopback_alias() {
            if !candidates.contains(&alias) {
                candidates.push(alias);
            }
        }
        candidates
    }
}

fn default_base() -> BaseUrl {
    Url::parse(DEFAULT_API_BASE)
        .ok()
        .and_then(BaseUrl::new)
        .unwrap_or_else(|| unreachable!("the default API base is a valid URL"))
}
