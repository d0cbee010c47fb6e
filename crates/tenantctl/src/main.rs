//! Command line client for resolving tenant codes.

use anyhow::{Context, Result};
use futures::future::join_all;
use tenant_resolver::resolver::static_origin;
use tenant_resolver::{TenantResolver, logging, metrics};

use output::Lookup;
use settings::{OutputFormat, Settings};

mod output;
mod settings;

fn main() {
    match execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}

fn execute() -> Result<()> {
    let settings = Settings::get()?;
    let config = &settings.config;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: The runtime is not started yet, so this is still single-threaded.
    unsafe { logging::init_logging(config) };

    if let Some(statsd) = &config.metrics.statsd {
        let tags = config.metrics.custom_tags.clone();
        if let Err(error) = metrics::configure_statsd(&config.metrics.prefix, statsd, tags) {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                "Failed to configure statsd"
            );
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("tenantctl")
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    let lookups = runtime.block_on(resolve_all(&settings))?;

    match settings.output_format {
        OutputFormat::Json => output::print_json(&lookups)?,
        OutputFormat::Compact => output::print_compact(&lookups),
    }

    let failed = lookups.iter().filter(|lookup| !lookup.is_ok()).count();
    if failed > 0 {
        anyhow::bail!("failed to resolve {failed} of {} tenant codes", lookups.len());
    }

    Ok(())
}

/// Resolves all codes concurrently, in the order they were given.
///
/// Codes that are given more than once share a single lookup.
async fn resolve_all(settings: &Settings) -> Result<Vec<Lookup>> {
    let page_origin = static_origin(settings.origin.clone());
    let resolver = TenantResolver::from_config(&settings.config, page_origin)
        .context("failed to create HTTP client")?;

    let results = join_all(settings.codes.iter().map(|code| resolver.resolve(code))).await;

    tracing::debug!(
        resolved = resolver.cached_count(),
        requested = settings.codes.len(),
        "Finished resolving tenants"
    );

    Ok(settings
        .codes
        .iter()
        .cloned()
        .zip(results)
        .map(|(code, result)| Lookup::new(code, result))
        .collect())
}
