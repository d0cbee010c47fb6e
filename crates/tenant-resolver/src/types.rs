use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::resolver::ResolveError;

/// A normalized tenant code.
///
/// Keys are trimmed of surrounding whitespace and never empty. Two keys are equal iff their
/// trimmed forms are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantKey(Arc<str>);

impl TenantKey {
    /// Normalizes a raw tenant code.
    ///
    /// Returns [`ResolveError::InvalidKey`] if the code is empty after trimming.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::InvalidKey);
        }
        Ok(Self(trimmed.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// The public metadata of a tenant, as returned by the remote service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDescriptor {
    pub id: i64,
    pub name: String,
    pub code: String,
}
