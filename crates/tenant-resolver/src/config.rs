use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sentry::types::Dsn;
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::resolver::{DEFAULT_API_PORT, DEFAULT_RESOLVE_PATH};

/// Environment variable that overrides the default API base.
pub const API_BASE_ENV: &str = "TENANT_API_BASE";

/// Environment variable that overrides the default resolve timeout, e.g. `15s`.
pub const RESOLVE_TIMEOUT_ENV: &str = "TENANT_RESOLVE_TIMEOUT";

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: env::var("STATSD_SERVER").ok(),
            prefix: "tenants".into(),
            custom_tags: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The base URL of the tenant API.
    ///
    /// When this is not set, the base is inferred from the page origin, or falls back to
    /// `http://localhost:8101`. Defaults to the `TENANT_API_BASE` environment variable.
    pub api_base: Option<Url>,

    /// The path below the API base at which tenants are looked up by code.
    pub resolve_path: String,

    /// The port of the tenant API when its base is inferred from the page origin.
    pub inferred_port: u16,

    /// The timeout for one lookup against a single candidate endpoint.
    ///
    /// When a candidate times out, the next one is tried. Defaults to the
    /// `TENANT_RESOLVE_TIMEOUT` environment variable, or `15s`.
    #[serde(with = "humantime_serde")]
    pub resolve_timeout: Duration,

    /// The timeout for establishing a connection to a candidate endpoint.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Configuration for internal logging.
    pub logging: Logging,

    /// Configuration for reporting metrics to a statsd instance.
    pub metrics: Metrics,

    /// DSN to report internal errors to
    pub sentry_dsn: Option<Dsn>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: env::var(API_BASE_ENV)
                .ok()
                .and_then(|base| parse_api_base(&base)),
            resolve_path: DEFAULT_RESOLVE_PATH.into(),
            inferred_port: DEFAULT_API_PORT,
            resolve_timeout: env::var(RESOLVE_TIMEOUT_ENV)
                .ok()
                .and_then(|timeout| parse_resolve_timeout(&timeout))
                .unwrap_or(Duration::from_secs(15)),
            connect_timeout: Duration::from_secs(5),
            logging: Logging::default(),
            metrics: Metrics::default(),
            sentry_dsn: None,
        }
    }
}

/// Parses the value of [`API_BASE_ENV`], warning if it is not a URL.
fn parse_api_base(value: &str) -> Option<Url> {
    match value.parse() {
        Ok(url) => Some(url),
        Err(error) => {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                value,
                "Ignoring invalid {API_BASE_ENV}"
            );
            None
        }
    }
}

/// Parses the value of [`RESOLVE_TIMEOUT_ENV`], warning if it is not a duration.
fn parse_resolve_timeout(value: &str) -> Option<Duration> {
    match humantime::parse_duration(value) {
        Ok(timeout) => Some(timeout),
        Err(error) => {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                value,
                "Ignoring invalid {RESOLVE_TIMEOUT_ENV}"
            );
            None
        }
    }
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            ),
            None => Ok(Config::default()),
        }
    }

    fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config file")?;
        // check for empty files explicitly
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }
}

#[derive(Debug)]
struct LevelFilterVisitor;

impl de::Visitor<'_> for LevelFilterVisitor {
    type Value = LevelFilter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            r#"one of the strings "off", "error", "warn", "info", "debug", or "trace""#
        )
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "off" => Ok(LevelFilter::OFF),
            "error" => Ok(LevelFilter::ERROR),
            "warn" => Ok(LevelFilter::WARN),
            "info" => Ok(LevelFilter::INFO),
            "debug" => Ok(LevelFilter::DEBUG),
            "trace" => Ok(LevelFilter::TRACE),
            _ => Err(de::Error::unknown_variant(
                v,
                &["off", "error", "warn", "info", "debug", "trace"],
            )),
        }
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    deserializer.deserialize_str(LevelFilterVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_settings() {
        let yaml = r#"
            api_base: http://127.0.0.1:9000/
            resolve_path: resolve
            inferred_port: 9443
            resolve_timeout: 2s 500ms
            connect_timeout: 250ms
        "#;
        let cfg = Config::from_reader(yaml.as_bytes()).unwrap();

        assert_eq!(cfg.api_base, Some("http://127.0.0.1:9000/".parse().unwrap()));
        assert_eq!(cfg.resolve_path, "resolve");
        assert_eq!(cfg.inferred_port, 9443);
        assert_eq!(cfg.resolve_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_unspecified_settings_use_defaults() {
        let yaml = r#"
            logging:
              level: debug
        "#;
        let cfg = Config::from_reader(yaml.as_bytes()).unwrap();
        let default_cfg = Config::default();

        assert_eq!(cfg.logging.level, LevelFilter::DEBUG);
        assert_eq!(cfg.logging.format, LogFormat::Auto);
        assert_eq!(cfg.resolve_path, DEFAULT_RESOLVE_PATH);
        assert_eq!(cfg.inferred_port, DEFAULT_API_PORT);
        assert_eq!(cfg.resolve_timeout, default_cfg.resolve_timeout);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.metrics.prefix, "tenants");
    }

    #[test]
    fn test_invalid_api_base() {
        let yaml = r#"
            api_base: "not a url"
        "#;
        assert!(Config::from_reader(yaml.as_bytes()).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let yaml = r#"
            logging:
              level: loud
        "#;
        assert!(Config::from_reader(yaml.as_bytes()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        assert_eq!(
            parse_api_base("http://localhost:9000/"),
            Some("http://localhost:9000/".parse().unwrap())
        );
        assert_eq!(parse_api_base("localhost 9000"), None);

        assert_eq!(parse_resolve_timeout("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_resolve_timeout("15"), None);
        assert_eq!(parse_resolve_timeout("fast"), None);
    }

    #[test]
    fn test_unknown_fields() {
        // Unknown fields should not cause failure
        let yaml = r#"
            caches:
              downloaded:
                max_unused_for: 1h
        "#;
        let cfg = Config::from_reader(yaml.as_bytes());
        assert!(cfg.is_ok());
    }

    #[test]
    fn test_empty_file() {
        // Empty files aren't supported
        let yaml = r#""#;
        let result = Config::from_reader(yaml.as_bytes());
        assert!(result.is_err());
    }
}
