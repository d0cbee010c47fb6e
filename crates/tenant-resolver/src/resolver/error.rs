use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// An error that happens when fetching a descriptor from a single candidate endpoint.
///
/// Errors are cloneable so that one failed attempt can be handed to every caller waiting
/// on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The endpoint did not respond within the per-attempt timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The endpoint responded with a non-success status code.
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    /// The request could not be sent or the response could not be received,
    /// like connection loss or DNS resolution.
    #[error("request failed: {0}")]
    Transport(String),
    /// The endpoint responded successfully, but the body is not a tenant descriptor.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The tenant code cannot be expressed as a path segment, like `.` or `..`.
    #[error("tenant code cannot be used as a URL path segment")]
    UnaddressableKey,
    /// The resolution task was torn down before it delivered a result.
    #[error("resolution was interrupted")]
    Interrupted,
}

impl FetchError {
    /// A short, stable name of the error kind, used for metric tags.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Status(_) => "status",
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
            Self::UnaddressableKey => "unaddressable",
            Self::Interrupted => "interrupted",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status)
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// An error returned by [`TenantResolver::resolve`](super::TenantResolver::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The tenant code is empty or only consists of whitespace.
    #[error("tenant code is required")]
    InvalidKey,
    /// Every candidate endpoint failed. Carries the error of the last attempt.
    #[error("tenant resolution failed")]
    ResolutionFailed(#[source] FetchError),
}
