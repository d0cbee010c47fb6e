use std::sync::Arc;

use futures::future::join_all;
use reqwest::StatusCode;
use tenant_resolver::ResolveError;
use tenant_resolver::resolver::FetchError;

use crate::{TenantServer, setup_resolver, tenant_path};

#[tokio::test]
async fn test_resolve_from_configured_base() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    let descriptor = resolver.resolve("acme").await.unwrap();
    assert_eq!(descriptor.id, 1);
    assert_eq!(descriptor.name, "Acme Corp");
    assert_eq!(descriptor.code, "acme");

    assert_eq!(server.all_hits(), [(tenant_path("acme"), 1)]);
}

#[tokio::test]
async fn test_memoized_without_network() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    let first = resolver.resolve("globex").await.unwrap();
    let second = resolver.resolve("  globex ").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(server.accesses(), 1);
    assert_eq!(resolver.cached("globex").as_deref(), Some(&*first));
    assert_eq!(resolver.cached_count(), 1);
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_request() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    let lookups = (0..8).map(|_| resolver.resolve("initech"));
    let results = join_all(lookups).await;

    for result in &results {
        assert_eq!(result.as_ref().unwrap().name, "Initech");
    }
    assert_eq!(server.all_hits(), [(tenant_path("initech"), 1)]);
    assert_eq!(resolver.in_flight_count(), 0);
}

#[tokio::test]
async fn test_different_codes_resolve_independently() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    let (acme, globex) = tokio::join!(resolver.resolve("acme"), resolver.resolve("globex"));

    assert_eq!(acme.unwrap().id, 1);
    assert_eq!(globex.unwrap().id, 2);
    assert_eq!(
        server.all_hits(),
        [(tenant_path("acme"), 1), (tenant_path("globex"), 1)]
    );
}

#[tokio::test]
async fn test_empty_code_is_rejected_without_network() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    assert_eq!(resolver.resolve("").await, Err(ResolveError::InvalidKey));
    assert_eq!(resolver.resolve(" \t ").await, Err(ResolveError::InvalidKey));
    assert_eq!(server.accesses(), 0);
}

#[tokio::test]
async fn test_unknown_code_is_not_memoized() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    let result = resolver.resolve("i-do-not-exist").await;
    assert_eq!(
        result,
        Err(ResolveError::ResolutionFailed(FetchError::Status(
            StatusCode::NOT_FOUND
        )))
    );
    // Both loopback aliases were tried.
    assert_eq!(server.all_hits(), [(tenant_path("i-do-not-exist"), 2)]);

    // Every call after a failure starts a fresh sweep.
    assert!(resolver.resolve("i-do-not-exist").await.is_err());
    assert_eq!(server.all_hits(), [(tenant_path("i-do-not-exist"), 2)]);
    assert_eq!(resolver.cached_count(), 0);
}

#[tokio::test]
async fn test_malformed_response() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/garbage/")));

    let result = resolver.resolve("acme").await;
    assert!(matches!(
        result,
        Err(ResolveError::ResolutionFailed(FetchError::Malformed(_)))
    ));
}

#[tokio::test]
async fn test_resolve_below_base_path() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| {
        config.api_base = Some(server.url("/"));
        config.resolve_path = "/fail/403/".into();
    });

    let result = resolver.resolve("acme").await;
    assert_eq!(
        result,
        Err(ResolveError::ResolutionFailed(FetchError::Status(
            StatusCode::FORBIDDEN
        )))
    );
    assert_eq!(server.all_hits(), [("/fail/403/acme".to_owned(), 2)]);
}

#[tokio::test]
async fn test_dot_segment_code_never_hits_collection() {
    let server = TenantServer::new();
    let resolver = setup_resolver(|config| config.api_base = Some(server.url("/")));

    for code in [".", " .. "] {
        assert_eq!(
            resolver.resolve(code).await,
            Err(ResolveError::ResolutionFailed(FetchError::UnaddressableKey))
        );
    }
    assert_eq!(server.accesses(), 0);
    assert_eq!(resolver.cached_count(), 0);
}
