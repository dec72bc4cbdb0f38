//! Cache error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// No derivative stored for this path and options
    #[error("file does not exist in cache")]
    Miss,

    /// The path tried to leave the cache root
    #[error("invalid URL path: {path}")]
    InvalidPath { path: String },

    /// A derivative cannot be stored without options to key it
    #[error("resource {path} has no transform options")]
    MissingOptions { path: String },

    #[error("memory cache provider: allowed memory size of {limit} bytes exhausted (requested {requested} bytes)")]
    CapacityExceeded { requested: u64, limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}
