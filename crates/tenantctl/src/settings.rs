use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tenant_resolver::config::Config;
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Outputs every lookup, including errors, as a JSON array.
    Json,
    /// Outputs the lookups as a table.
    Compact,
}

/// Resolves tenant codes to their public descriptors.
///
/// All codes are resolved concurrently, and each code is looked up at most once. The process
/// exits with a non-zero status if any code could not be resolved.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    /// The tenant codes to resolve.
    #[arg(required = true)]
    pub codes: Vec<String>,

    /// Path to your configuration file.
    #[arg(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The base URL of the tenant API.
    ///
    /// Overrides `api_base` from the configuration file and the `TENANT_API_BASE`
    /// environment variable.
    #[arg(long)]
    pub api_base: Option<Url>,

    /// The origin of the page the lookup is made for.
    ///
    /// Used to infer the API base when none is configured.
    #[arg(long)]
    pub origin: Option<Url>,

    /// The timeout for a lookup against a single endpoint, e.g. `5s` or `500ms`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// The output format.
    #[arg(long, value_enum, default_value = "compact")]
    pub format: OutputFormat,

    /// The severity level of logging output.
    ///
    /// Possible values:
    /// off, error, warn, info, debug, trace
    #[arg(long)]
    pub log_level: Option<LevelFilter>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub codes: Vec<String>,
    pub config: Config,
    pub origin: Option<Url>,
    pub output_format: OutputFormat,
}

impl Settings {
    pub fn get() -> Result<Self> {
        let cli = Cli::parse();

        let mut config = Config::get(cli.config.as_deref()).context("failed loading config")?;
        if let Some(api_base) = cli.api_base {
            config.api_base = Some(api_base);
        }
        if let Some(timeout) = cli.timeout {
            config.resolve_timeout = timeout;
        }
        if let Some(level) = cli.log_level {
            config.logging.level = level;
        }

        Ok(Self {
            codes: cli.codes,
            config,
            origin: cli.origin,
            output_format: cli.format,
        })
    }
}
