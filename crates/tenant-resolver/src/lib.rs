//! Resolves tenant codes to their public descriptors.
//!
//! The main entry point is [`TenantResolver`](resolver::TenantResolver), which memoizes
//! successful lookups and deduplicates concurrent lookups for the same code.

#[macro_use]
pub mod metrics;

pub mod config;
pub mod logging;
pub mod resolver;
pub mod types;
pub mod utils;

pub use resolver::{ResolveError, TenantResolver};
pub use types::{TenantDescriptor, TenantKey};
