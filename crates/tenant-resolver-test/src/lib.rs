//! Helpers for testing the tenant resolver.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using a [`TenantServer`], make sure that the server is held until all requests to
//!    the server have been made. To avoid dropping it early, assign it to a variable:
//!    `let server = TenantServer::new();`.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{self, Request};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::header::HOST;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
/// Initializes logs: The logger only captures logs from the `tenant_resolver` crate and mutes all
/// other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("tenant_resolver=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A tenant as served by the [`TenantServer`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tenant {
    pub id: i64,
    pub name: &'static str,
    pub code: &'static str,
}

/// The tenants served by [`TenantServer::new`].
pub const TENANTS: &[Tenant] = &[
    Tenant {
        id: 1,
        name: "Acme Corp",
        code: "acme",
    },
    Tenant {
        id: 2,
        name: "Globex Corporation",
        code: "globex",
    },
    Tenant {
        id: 3,
        name: "Initech",
        code: "initech",
    },
];

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    pub handle: tokio::task::JoinHandle<()>,
    pub socket: SocketAddr,
}

impl Server {
    /// Creates a new test server serving the given router.
    pub fn with_router(router: Router) -> Self {
        let listener = std::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A tenant API serving the fixed [`TENANTS`], which counts all requests it receives.
///
/// Besides `/api/v1/tenants/by-code/:code`, the server knows these routes:
///
/// - `/fail/:status/*tail` responds with the given status code.
/// - `/delay/:time/*tail` waits for the given duration, then redirects to `/*tail`.
/// - `/garbage/*tail` responds with a body that is not a tenant.
///
/// Requests with a `Host` header naming an unavailable host are answered with
/// `503 Service Unavailable`, but still counted.
pub struct TenantServer {
    server: Server,
    hits: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl TenantServer {
    pub fn new() -> Self {
        Self::with_unavailable_hosts(&[])
    }

    /// Creates a server that rejects requests addressed to any of the given host names.
    pub fn with_unavailable_hosts(hosts: &[&str]) -> Self {
        let hits = Arc::new(Mutex::new(BTreeMap::new()));
        let unavailable: Arc<BTreeSet<String>> =
            Arc::new(hosts.iter().map(|host| host.to_string()).collect());

        let hitcounter = {
            let hits = hits.clone();
            move |extract::OriginalUri(uri), req: Request, next: Next| {
                let hits = hits.clone();
                let unavailable = unavailable.clone();
                async move {
                    {
                        let mut hits = hits.lock().unwrap();
                        let hits = hits.entry(uri.to_string()).or_default();
                        *hits += 1;
                    }

                    let host = req
                        .headers()
                        .get(HOST)
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.split(':').next())
                        .unwrap_or_default();
                    if unavailable.contains(host) {
                        return StatusCode::SERVICE_UNAVAILABLE.into_response();
                    }

                    next.run(req).await
                }
            }
        };

        let router = Router::new()
            .route(
                "/api/v1/tenants/by-code/:code",
                get(|extract::Path(code): extract::Path<String>| async move {
                    match TENANTS.iter().find(|tenant| tenant.code == code) {
                        Some(tenant) => Json(tenant.clone()).into_response(),
                        None => (
                            StatusCode::NOT_FOUND,
                            Json(serde_json::json!({ "error": "tenant not found" })),
                        )
                            .into_response(),
                    }
                }),
            )
            .route(
                "/fail/:status/*tail",
                get(
                    |extract::Path((status, _)): extract::Path<(u16, String)>| async move {
                        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                    },
                ),
            )
            .route(
                "/delay/:time/*tail",
                get(
                    |extract::Path((time, tail)): extract::Path<(String, String)>| async move {
                        let duration = humantime::parse_duration(&time).unwrap();
                        tokio::time::sleep(duration).await;

                        (StatusCode::FOUND, [("Location", format!("/{tail}"))])
                    },
                ),
            )
            .route(
                "/garbage/*tail",
                get(|extract::Path(tail): extract::Path<String>| async move { tail }),
            )
            .layer(middleware::from_fn(hitcounter));

        let server = Server::with_router(router);

        Self { server, hits }
    }

    /// Returns the total number of requests since the last call, and resets the counters.
    pub fn accesses(&self) -> usize {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_values().sum()
    }

    /// Returns the number of requests per path since the last call, and resets the counters.
    pub fn all_hits(&self) -> Vec<(String, usize)> {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_iter().collect()
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }
}

impl Default for TenantServer {
    fn default() -> Self {
        Self::new()
    }
}
