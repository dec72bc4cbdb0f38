//! Image transformation module
//!
//! - `options`: transform parameters and their cache digest
//! - `params` / `color`: lenient parsers for individual query parameters
//! - `processor`: the `TransformEngine` seam and its `image`-based implementation
//! - `encoder`, `format`, `sniff`: codecs and MIME helpers
//! - `limits`: size ceilings checked before pixel buffers are allocated
//!
//! # Query Parameters
//! ```text
//! /photos/cat.jpg?w=800&h=600&fit=crop-top&q=80&fm=webp&dpr=2
//! ```

pub mod color;
pub mod encoder;
pub mod error;
pub mod format;
pub mod limits;
pub mod options;
pub mod params;
pub mod processor;
pub mod sniff;

pub use color::{parse_color, Rgb};
pub use error::ImageError;
pub use format::{extension_of, format_from_mime};
pub use limits::DimensionLimits;
pub use options::{Options, OptionsError};
pub use params::{Crop, Fit, Format, Orientation};
pub use processor::{process_image, ImageProcessor, TransformEngine, TransformOutput};
pub use sniff::sniff_mime_type;

#[cfg(test)]
pub use processor::MockTransformEngine;
