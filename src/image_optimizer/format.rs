//! MIME type helpers
//!
//! Maps between negotiated/sniffed MIME types and output formats.

use super::params::Format;

/// Extract the format named by a MIME type
///
/// Parameters and structured-syntax suffixes are ignored, so
/// `image/svg+xml; charset=utf-8` yields `Format::Svg`.
pub fn format_from_mime(mime: &str) -> Format {
    let essence = mime.split(';').next().unwrap_or("").trim();
    let subtype = match essence.split_once('/') {
        Some((_, subtype)) => subtype,
        None => return Format::Unknown,
    };
    let subtype = subtype.split('+').next().unwrap_or("");

    subtype.parse().unwrap_or_default()
}

/// Map a sniffed `image` crate format to our output format
pub fn format_from_image(format: image::ImageFormat) -> Format {
    match format {
        image::ImageFormat::Jpeg => Format::Jpeg,
        image::ImageFormat::Png => Format::Png,
        image::ImageFormat::WebP => Format::Webp,
        image::ImageFormat::Tiff => Format::Tiff,
        image::ImageFormat::Gif => Format::Gif,
        _ => Format::Unknown,
    }
}

/// Lowercase extension of the last path segment, without the dot
pub fn extension_of(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() || !ext.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}
