use std::time::Duration;

use reqwest::StatusCode;
use tenant_resolver::ResolveError;
use tenant_resolver::resolver::FetchError;

use crate::{TenantServer, setup_resolver, setup_resolver_with_origin, tenant_path};

#[tokio::test]
async fn test_falls_back_to_loopback_alias() {
    let server = TenantServer::with_unavailable_hosts(&["localhost"]);
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    let descriptor = resolver.resolve("acme").await.unwrap();
    assert_eq!(descriptor.name, "Acme Corp");

    // `localhost` answered with 503, `127.0.0.1` with the tenant.
    assert_eq!(server.all_hits(), [(tenant_path("acme"), 2)]);

    // The memoized descriptor no longer depends on the failing candidate.
    resolver.resolve("acme").await.unwrap();
    assert_eq!(server.accesses(), 0);
}

#[tokio::test]
async fn test_reports_last_candidate_error() {
    let server = TenantServer::with_unavailable_hosts(&["localhost", "127.0.0.1"]);
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    let result = resolver.resolve("acme").await;
    assert_eq!(
        result,
        Err(ResolveError::ResolutionFailed(FetchError::Status(
            StatusCode::SERVICE_UNAVAILABLE
        )))
    );
    assert_eq!(server.accesses(), 2);
}

#[tokio::test]
async fn test_base_inferred_from_page_origin() {
    let server = TenantServer::new();
    let origin = "http://localhost:5173/tenant/login?next=/".parse().ok();
    let resolver = setup_resolver_with_origin(origin, |config| {
        config.inferred_port = server.port();
    });

    let descriptor = resolver.resolve("globex").await.unwrap();
    assert_eq!(descriptor.id, 2);
    assert_eq!(server.all_hits(), [(tenant_path("globex"), 1)]);
}

#[tokio::test]
async fn test_configured_base_wins_over_page_origin() {
    let server = TenantServer::new();
    let origin = "http://localhost:1/".parse().ok();
    let resolver = setup_resolver_with_origin(origin, |config| {
        config.api_base = Some(server.url("/"));
        config.inferred_port = 1;
    });

    assert!(resolver.resolve("initech").await.is_ok());
    assert_eq!(server.accesses(), 1);
}

#[tokio::test]
async fn test_unreachable_candidates() {
    let resolver = setup_resolver(|config| {
        config.api_base = "http://127.0.0.1:1/".parse().ok();
    });

    let result = resolver.resolve("acme").await;
    assert!(matches!(
        result,
        Err(ResolveError::ResolutionFailed(FetchError::Transport(_)))
    ));
    assert_eq!(resolver.in_flight_count(), 0);
}

#[tokio::test]
async fn test_slow_candidate_within_timeout() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| {
        config.api_base = Some(server.url("/delay/50ms/"));
        config.resolve_timeout = Duration::from_secs(5);
    });

    let descriptor = resolver.resolve("acme").await.unwrap();
    assert_eq!(descriptor.id, 1);
    assert_eq!(
        server.all_hits(),
        [
            (tenant_path("acme"), 1),
            (format!("/delay/50ms{}", tenant_path("acme")), 1),
        ]
    );
}

#[tokio::test]
async fn test_every_candidate_times_out() {
    let server = TenantServer::new();
    let timeout = Duration::from_millis(200);
    let resolver = setup_resolver(|config| {
        config.api_base = Some(server.url("/delay/5s/"));
        config.resolve_timeout = timeout;
    });

    let result = resolver.resolve("acme").await;
    assert_eq!(
        result,
        Err(ResolveError::ResolutionFailed(FetchError::Timeout(timeout)))
    );
    // Each loopback alias got its own attempt.
    assert_eq!(
        server.all_hits(),
        [(format!("/delay/5s{}", tenant_path("acme")), 2)]
    );
}
