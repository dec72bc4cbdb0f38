//! Security Validation Module
//!
//! Guards shared by the pipeline and every storage provider:
//! - path traversal (400 / InvalidPath before storage is touched)
//! - oversized uploads (413)
//! - timing-safe secret comparison

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("Request payload size {size} exceeds limit {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Path traversal attempt detected: {path}")]
    PathTraversal { path: String },
}

/// Whether any `/` or `\` separated segment of `path` is exactly `..`
pub fn contains_dot_dot(path: &str) -> bool {
    if !path.contains("..") {
        return false;
    }
    path.split(['/', '\\']).any(|segment| segment == "..")
}

/// Reject parent-directory segments and NUL bytes
pub fn check_path_traversal(path: &str) -> Result<(), SecurityError> {
    if contains_dot_dot(path) || path.contains('\0') {
        return Err(SecurityError::PathTraversal {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Validate request body size
pub fn validate_body_size(size: usize, limit: usize) -> Result<(), SecurityError> {
    if size > limit {
        return Err(SecurityError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

/// Constant-time string comparison to prevent timing attacks
///
/// Length mismatches return early; only the length leaks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
