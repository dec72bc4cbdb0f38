//! Error types for the transform engine

use thiserror::Error;

/// Errors raised while decoding, transforming or encoding an image
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: String },

    #[error("Resize failed: {message}")]
    ResizeFailed { message: String },

    #[error("Failed to encode to {format}: {message}")]
    EncodeFailed { format: String, message: String },

    #[error("Unsupported rotation: {degrees} degrees")]
    UnsupportedRotation { degrees: u16 },

    #[error(
        "Requested size {width}x{height} exceeds the limit of {max_width}x{max_height} ({max_pixels} pixels)"
    )]
    DimensionsTooLarge {
        width: u64,
        height: u64,
        max_width: u32,
        max_height: u32,
        max_pixels: u64,
    },

    #[error("Transform task failed: {message}")]
    TaskFailed { message: String },
}

impl ImageError {
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ImageError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }
}
