//! Output encoders
//!
//! One function per target format on top of the `image` crate codecs. Every
//! encoder takes RGBA pixels; JPEG flattens alpha onto the background color.

use image::{ColorType, DynamicImage, ImageEncoder as _, RgbaImage};
use std::io::Cursor;

use super::color::Rgb;
use super::error::ImageError;
use super::params::Format;
use crate::constants::DEFAULT_ENCODE_QUALITY;

const WHITE: Rgb = [255, 255, 255];

/// Encode an image into `format`
///
/// `quality` of 0 means "not requested" and uses the encoder default.
pub fn encode(
    img: &DynamicImage,
    format: Format,
    quality: u8,
    background: Option<Rgb>,
) -> Result<Vec<u8>, ImageError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut output = Cursor::new(Vec::new());

    match format {
        Format::Jpeg => {
            let quality = if quality == 0 {
                DEFAULT_ENCODE_QUALITY
            } else {
                quality.clamp(1, 100)
            };
            let rgb = flatten_alpha(&rgba, background.unwrap_or(WHITE));
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality)
                .write_image(&rgb, width, height, ColorType::Rgb8)
                .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;
        }
        Format::Png => {
            image::codecs::png::PngEncoder::new(&mut output)
                .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| ImageError::encode_failed("png", e.to_string()))?;
        }
        Format::Webp => {
            // The image crate only ships a lossless WebP encoder.
            image::codecs::webp::WebPEncoder::new_lossless(&mut output)
                .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| ImageError::encode_failed("webp", e.to_string()))?;
        }
        Format::Tiff => {
            image::codecs::tiff::TiffEncoder::new(&mut output)
                .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| ImageError::encode_failed("tiff", e.to_string()))?;
        }
        Format::Gif => {
            let mut encoder = image::codecs::gif::GifEncoder::new(&mut output);
            encoder
                .encode(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| ImageError::encode_failed("gif", e.to_string()))?;
        }
        Format::Svg | Format::Pdf | Format::Unknown => {
            return Err(ImageError::unsupported_format(format.as_str()));
        }
    }

    Ok(output.into_inner())
}

/// Composite RGBA pixels over a solid color, dropping the alpha channel
fn flatten_alpha(rgba: &RgbaImage, background: Rgb) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.as_raw().len() / 4 * 3);

    for chunk in rgba.as_raw().chunks_exact(4) {
        let alpha = chunk[3] as u32;
        for channel in 0..3 {
            let fg = chunk[channel] as u32;
            let bg = background[channel] as u32;
            rgb.push(((fg * alpha + bg * (255 - alpha) + 127) / 255) as u8);
        }
    }

    rgb
}
