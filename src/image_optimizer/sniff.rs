//! Content sniffing for uploaded bytes

use crate::constants::OCTET_STREAM;

/// Identify the MIME type of `data` from its magic number
///
/// Image formats known to the decoder win; `infer`'s wider table is the
/// fallback; unknown content is `application/octet-stream`.
pub fn sniff_mime_type(data: &[u8]) -> String {
    if let Some(mime) = image::guess_format(data).ok().and_then(decoder_mime_type) {
        return mime.to_string();
    }

    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

fn decoder_mime_type(format: image::ImageFormat) -> Option<&'static str> {
    match format {
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::WebP => Some("image/webp"),
        image::ImageFormat::Tiff => Some("image/tiff"),
        image::ImageFormat::Gif => Some("image/gif"),
        image::ImageFormat::Bmp => Some("image/bmp"),
        image::ImageFormat::Ico => Some("image/x-icon"),
        _ => None,
    }
}
