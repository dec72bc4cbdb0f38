//! Source providers: durable storage of original images keyed by logical path

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::Resource;

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemSource;
pub use memory::MemorySource;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The path tried to leave the storage root
    #[error("invalid URL path: {path}")]
    InvalidPath { path: String },

    #[error("source file {path} does not exist")]
    NotFound { path: String },

    /// The path names something other than a regular file
    #[error("source path {path} is not a file")]
    NotAFile { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage of original images
///
/// Every implementation rejects `..` segments with `InvalidPath` before it
/// touches storage, and reports missing paths as `NotFound`.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Fetch the original image stored at `path`
    async fn get(&self, path: &str) -> Result<Resource, SourceError>;

    /// Store `resource`'s body at its path, replacing any previous image
    async fn set(&self, resource: &Resource) -> Result<(), SourceError>;

    /// Remove the original image stored at `path`
    async fn del(&self, path: &str) -> Result<(), SourceError>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}

pub(crate) fn ensure_safe_path(path: &str) -> Result<(), SourceError> {
    crate::security::check_path_traversal(path).map_err(|_| {
        tracing::warn!(path = %path, "Rejected source path traversal attempt");
        SourceError::InvalidPath {
            path: path.to_string(),
        }
    })
}
