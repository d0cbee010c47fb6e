use reqwest::Url;
use tenant_resolver::TenantResolver;
use tenant_resolver::config::Config;
use tenant_resolver::resolver::static_origin;
use tenant_resolver_test as test;

pub use test::{TenantServer, setup};

/// Setup tests and create a resolver that talks to a local tenant API.
///
/// The resolver has neither an API base nor a page origin, unless the `update_config` closure
/// sets an `api_base`.
pub fn setup_resolver(update_config: impl FnOnce(&mut Config)) -> TenantResolver {
    setup_resolver_with_origin(None, update_config)
}

/// Like [`setup_resolver`], but with the given page origin.
pub fn setup_resolver_with_origin(
    origin: Option<Url>,
    update_config: impl FnOnce(&mut Config),
) -> TenantResolver {
    test::setup();

    let mut config = Config {
        api_base: None,
        ..Default::default()
    };
    update_config(&mut config);

    TenantResolver::from_config(&config, static_origin(origin)).unwrap()
}

/// Returns the path at which the tenant API serves `code`.
pub fn tenant_path(code: &str) -> String {
    format!("/api/v1/tenants/by-code/{code}")
}

