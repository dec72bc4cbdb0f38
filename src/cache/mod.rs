//! Derivative cache providers keyed by `(logical path, options hash)`
//!
//! Two backends share the `CacheProvider` contract:
//! - `FilesystemCache`: one file per derivative under `root/<path>/<hash>`
//! - `MemoryCache`: in-process map with a byte budget
//!
//! Both own a `Sweeper` that evicts entries older than the configured lifetime.

use async_trait::async_trait;
use std::time::Duration;

use crate::resource::Resource;
use crate::security::check_path_traversal;

pub mod error;
pub mod filesystem;
pub mod memory;
pub mod sweeper;

pub use error::CacheError;
pub use filesystem::FilesystemCache;
pub use memory::MemoryCache;
pub use sweeper::Sweeper;

/// Eviction settings shared by every backend
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Age after which an entry is removed
    pub life_time: Duration,
    /// Delay between two sweeps
    pub clean_interval: Duration,
}

/// Storage of transformed derivatives
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Fetch the derivative for `resource`'s path and options
    ///
    /// A resource without options is always a `Miss`.
    async fn get(&self, resource: &Resource) -> Result<Resource, CacheError>;

    /// Store `resource`'s body as the derivative for its path and options
    async fn set(&self, resource: &Resource) -> Result<(), CacheError>;

    /// Remove every derivative stored for `path`
    async fn del(&self, path: &str) -> Result<(), CacheError>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Stop the background eviction task
    fn shutdown(&self);
}

/// Validate a logical path and return it without leading slashes
///
/// The root itself is rejected so a family delete can never wipe the cache.
pub(crate) fn cache_relative_path(path: &str) -> Result<&str, CacheError> {
    let relative = crate::resource::relative_path(path);
    if check_path_traversal(path).is_err() || relative.is_empty() {
        tracing::warn!(path = %path, "Rejected invalid cache path");
        return Err(CacheError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(relative)
}
