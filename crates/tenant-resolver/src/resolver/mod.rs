//! Memoizing, deduplicating resolution of tenant codes.
//!
//! A [`TenantResolver`] keeps two maps behind a single lock:
//!
//! - the completed results, which are kept for the lifetime of the resolver, and
//! - the currently running computations, each of which is a shared channel that every caller
//!   asking for the same code awaits.
//!
//! A computation tries each candidate endpoint produced by the [`CandidateBuilder`] in order,
//! until one of them yields a descriptor. Failures are never memoized.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use sentry::{Hub, SentryFutureExt};
use url::Url;

use crate::config::Config;
use crate::types::{TenantDescriptor, TenantKey};
use crate::utils::http::{ResolveTimeouts, create_client};

mod candidates;
mod error;
mod http;

pub use candidates::{BaseUrl, CandidateBuilder, DEFAULT_API_BASE, DEFAULT_API_PORT, PageOrigin};
pub use error::{FetchError, ResolveError};
pub use http::{DEFAULT_RESOLVE_PATH, HttpFetcher, USER_AGENT};

/// The outcome of resolving a single tenant code.
pub type ResolveResult = Result<Arc<TenantDescriptor>, ResolveError>;

type ComputationChannel = Shared<oneshot::Receiver<ResolveResult>>;

/// Fetches a tenant descriptor from one candidate endpoint.
///
/// This is invoked at most once per candidate and resolution attempt. Timeouts are enforced by
/// the [`TenantResolver`], implementations do not need to apply their own.
pub trait FetchTenant: 'static + Send + Sync {
    fn fetch<'a>(
        &'a self,
        base: &'a BaseUrl,
        key: &'a TenantKey,
    ) -> BoxFuture<'a, Result<TenantDescriptor, FetchError>>;
}

#[derive(Default)]
struct ResolverState {
    /// Successfully resolved descriptors. Entries are never evicted.
    completed: HashMap<TenantKey, Arc<TenantDescriptor>>,
    /// Used for deduplicating concurrent lookups.
    current_computations: HashMap<TenantKey, ComputationChannel>,
}

struct Inner<F> {
    fetcher: F,
    candidates: CandidateBuilder,
    timeout: Duration,
    state: Mutex<ResolverState>,
}

impl<F> Inner<F> {
    fn state(&self) -> MutexGuard<'_, ResolverState> {
        // The state is consistent after every individual map operation, so a poisoned lock
        // is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves tenant codes to [`TenantDescriptor`]s.
///
/// Successful resolutions are memoized, and concurrent resolutions of the same code are
/// deduplicated into a single attempt. Cloning the resolver is cheap, and clones share their
/// caches.
pub struct TenantResolver<F = HttpFetcher> {
    inner: Arc<Inner<F>>,
}

impl<F> Clone for TenantResolver<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> fmt::Debug for TenantResolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("TenantResolver")
            .field("candidates", &self.inner.candidates)
            .field("timeout", &self.inner.timeout)
            .field("completed", &state.completed.len())
            .field("current_computations", &state.current_computations.len())
            .finish()
    }
}

impl TenantResolver<HttpFetcher> {
    /// Creates a resolver that fetches over HTTP, as configured by `config`.
    ///
    /// The `page_origin` is used to infer the API base when none is configured.
    pub fn from_config(
        config: &Config,
        page_origin: Arc<dyn PageOrigin>,
    ) -> Result<Self, reqwest::Error> {
        let timeouts = ResolveTimeouts::from_config(config);
        let client = create_client(&timeouts)?;
        let fetcher = HttpFetcher::new(client, config.resolve_path.clone());
        let candidates = CandidateBuilder::new(config.api_base.clone(), page_origin)
            .with_inferred_port(config.inferred_port);

        Ok(Self::new(fetcher, candidates, timeouts.request))
    }
}

impl<F: FetchTenant> TenantResolver<F> {
    pub fn new(fetcher: F, candidates: CandidateBuilder, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                candidates,
                timeout,
                state: Mutex::default(),
            }),
        }
    }

    /// Resolves a tenant code to its descriptor.
    ///
    /// The code is trimmed first; an empty code fails with [`ResolveError::InvalidKey`].
    ///
    /// If the code was resolved before, the memoized descriptor is returned without any network
    /// access. If a resolution of the same code is already running, this waits for its result.
    /// Otherwise, a new resolution is spawned on the current tokio runtime. It runs to completion
    /// even if all callers stop waiting for it.
    pub async fn resolve(&self, code: &str) -> ResolveResult {
        let key = TenantKey::parse(code)?;

        let (channel, computation) = {
            let mut state = self.inner.state();
            if let Some(descriptor) = state.completed.get(&key) {
                metric!(counter("tenants.cache.hit") += 1);
                return Ok(Arc::clone(descriptor));
            }

            if let Some(channel) = state.current_computations.get(&key) {
                // A concurrent lookup was deduplicated.
                metric!(counter("tenants.channel.hit") += 1);
                (channel.clone(), None)
            } else {
                metric!(counter("tenants.channel.miss") += 1);
                let (channel, computation) = self.create_computation(key.clone());
                let evicted = state.current_computations.insert(key, channel.clone());
                debug_assert!(evicted.is_none());
                (channel, Some(computation))
            }
        };

        // Spawned outside of the lock, since a task that is rejected by the runtime is dropped
        // right away, which in turn removes it from `current_computations`.
        if let Some(computation) = computation {
            tokio::spawn(computation);
        }

        channel
            .await
            .unwrap_or(Err(ResolveError::ResolutionFailed(FetchError::Interrupted)))
    }

    /// Returns the memoized descriptor for `code`, without resolving it.
    pub fn cached(&self, code: &str) -> Option<Arc<TenantDescriptor>> {
        let key = TenantKey::parse(code).ok()?;
        self.inner.state().completed.get(&key).cloned()
    }

    /// The number of memoized descriptors.
    pub fn cached_count(&self) -> usize {
        self.inner.state().completed.len()
    }

    /// The number of resolutions that are currently running.
    pub fn in_flight_count(&self) -> usize {
        self.inner.state().current_computations.len()
    }

    /// Creates the resolution of `key` and a shareable channel for its result.
    ///
    /// The caller is responsible for registering the channel in `current_computations` and for
    /// spawning the computation. Once the computation finishes, it stores successful results in
    /// `completed`, sends the result over the channel, and only then removes the channel from
    /// `current_computations`.
    fn create_computation(
        &self,
        key: TenantKey,
    ) -> (ComputationChannel, BoxFuture<'static, ()>) {
        let (sender, receiver) = oneshot::channel();

        let remove_computation_token = RemoveComputation {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
        };

        let inner = Arc::clone(&self.inner);
        let computation = async move {
            let result = inner.compute(&key).await;
            if let Ok(descriptor) = &result {
                inner.state().completed.insert(key, Arc::clone(descriptor));
            }

            // Deliver first, then evict from the map. Callers arriving in between attach to
            // a channel that already holds the result.
            sender.send(result).ok();
            drop(remove_computation_token);
        }
        .bind_hub(Hub::new_from_top(Hub::current()));

        (receiver.shared(), Box::pin(computation))
    }
}

impl<F: FetchTenant> Inner<F> {
    /// Tries every candidate endpoint in order, until one yields a descriptor.
    async fn compute(&self, key: &TenantKey) -> ResolveResult {
        let start = Instant::now();
        let mut last_error = None;

        for base in self.candidates.build() {
            let result = match tokio::time::timeout(self.timeout, self.fetcher.fetch(&base, key))
                .await
            {
                Ok(result) => result,
                Err(_elapsed) => Err(FetchError::Timeout(self.timeout)),
            };

            match result {
                Ok(descriptor) => {
                    tracing::debug!(tenant = %key, base = %base, "Resolved tenant");
                    metric!(timer("tenants.resolve.duration") = start.elapsed(), "status" => "ok");
                    return Ok(Arc::new(descriptor));
                }
                Err(err) => {
                    tracing::debug!(
                        error = &err as &dyn std::error::Error,
                        tenant = %key,
                        base = %base,
                        "Candidate endpoint failed"
                    );
                    metric!(counter("tenants.candidate.failed") += 1, "reason" => err.kind());
                    last_error = Some(err);
                }
            }
        }

        metric!(timer("tenants.resolve.duration") = start.elapsed(), "status" => "failed");
        let cause = last_error.unwrap_or(FetchError::Interrupted);
        tracing::warn!(
            error = &cause as &dyn std::error::Error,
            tenant = %key,
            "Failed to resolve tenant from any candidate endpoint"
        );
        Err(ResolveError::ResolutionFailed(cause))
    }
}

/// Removes a computation from `current_computations` when dropped.
///
/// This runs when the computation finishes, and also when its task is torn down early.
struct RemoveComputation<F> {
    inner: Arc<Inner<F>>,
    key: TenantKey,
}

impl<F> Drop for RemoveComputation<F> {
    fn drop(&mut self) {
        self.inner.state().current_computations.remove(&self.key);
    }
}

/// Returns the page origin for an explicitly given URL.
///
/// This is a convenience for callers that know their origin up front.
pub fn static_origin(origin: Option<Url>) -> Arc<dyn PageOrigin> {
    Arc::new(origin)
}
