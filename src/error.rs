// Error types module

use http::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::image_optimizer::ImageError;
use crate::source::SourceError;

/// Request-facing error taxonomy
///
/// Every failure a request can end with is one of these. Storage and engine
/// faults keep their detail for the logs; `public_message` is what the client
/// sees.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Traversal attempt in the request path
    #[error("Invalid URL path: {path}")]
    InvalidPath { path: String },

    /// Missing source image
    #[error("File {path} not found")]
    NotFound { path: String },

    /// Extension or MIME type outside the allow-set
    #[error("File {path} is not supported")]
    UnsupportedMedia { path: String },

    /// Query string that could not be decoded at all
    #[error("Malformed options: {message}")]
    MalformedOptions { message: String },

    /// Memory cache budget exhausted on a foreground write
    #[error("Cache capacity exceeded: {message}")]
    CapacityExceeded { message: String },

    /// Storage-layer fault
    #[error("I/O failure: {message}")]
    IoFailure { message: String },

    /// Transform engine fault
    #[error("Engine failure: {message}")]
    EngineFailure { message: String },

    #[error("Not authorized")]
    Unauthorized,

    #[error("Request body of {size} bytes exceeds the {max_size} bytes limit")]
    PayloadTooLarge { size: usize, max_size: usize },

    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ServiceError {
    /// HTTP status code for this error
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidPath { .. }
            | ServiceError::MalformedOptions { .. }
            | ServiceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound { .. } | ServiceError::UnsupportedMedia { .. } => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ServiceError::CapacityExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            ServiceError::IoFailure { .. } | ServiceError::EngineFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Message safe to show to a client
    ///
    /// Storage and engine errors collapse to a generic sentence so library
    /// error text and filesystem paths never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::IoFailure { .. } => "Error while accessing storage".to_string(),
            ServiceError::EngineFailure { .. } => "Error while processing the image".to_string(),
            ServiceError::CapacityExceeded { .. } => "Cache capacity exceeded".to_string(),
            other => other.to_string(),
        }
    }

    /// Map a source provider error for the given request path
    pub fn from_source(path: &str, err: SourceError) -> Self {
        match err {
            SourceError::InvalidPath { .. } => ServiceError::InvalidPath {
                path: path.to_string(),
            },
            SourceError::NotFound { .. } => ServiceError::NotFound {
                path: path.to_string(),
            },
            other => ServiceError::IoFailure {
                message: other.to_string(),
            },
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(_: AuthError) -> Self {
        ServiceError::Unauthorized
    }
}

impl From<ImageError> for ServiceError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::DimensionsTooLarge { .. } => ServiceError::BadRequest {
                message: err.to_string(),
            },
            other => ServiceError::EngineFailure {
                message: other.to_string(),
            },
        }
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidPath { path } => ServiceError::InvalidPath { path },
            CacheError::CapacityExceeded { .. } => ServiceError::CapacityExceeded {
                message: err.to_string(),
            },
            other => ServiceError::IoFailure {
                message: other.to_string(),
            },
        }
    }
}
