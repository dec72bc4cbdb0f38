//! Image processing implementation
//!
//! Handles the actual image transformation: decode → rotate → crop → resize →
//! adjust → encode. The request path only sees the `TransformEngine` trait.

use async_trait::async_trait;
use bytes::Bytes;
use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::color::Rgb;
use super::encoder::encode;
use super::error::ImageError;
use super::format::format_from_image;
use super::limits::DimensionLimits;
use super::options::Options;
use super::params::{Fit, Format, Orientation};

/// Transformed bytes and their MIME type
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub body: Bytes,
    pub mime_type: String,
}

/// Turns source bytes plus resolved options into derivative bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransformEngine: Send + Sync {
    async fn transform(
        &self,
        source: Bytes,
        options: Arc<Options>,
    ) -> Result<TransformOutput, ImageError>;
}

/// Transform engine backed by `image` and `fast_image_resize`
///
/// Work runs on the blocking pool; a semaphore bounds how many images are
/// decoded at once.
pub struct ImageProcessor {
    permits: Arc<Semaphore>,
    limits: DimensionLimits,
}

impl ImageProcessor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            limits: DimensionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DimensionLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl TransformEngine for ImageProcessor {
    async fn transform(
        &self,
        source: Bytes,
        options: Arc<Options>,
    ) -> Result<TransformOutput, ImageError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ImageError::TaskFailed {
                message: e.to_string(),
            })?;

        let limits = self.limits;
        let (data, format) =
            tokio::task::spawn_blocking(move || process_image(&source, &options, &limits))
                .await
                .map_err(|e| ImageError::TaskFailed {
                    message: e.to_string(),
                })??;

        Ok(TransformOutput {
            body: Bytes::from(data),
            mime_type: format.content_type().to_string(),
        })
    }
}

/// Run the full transform synchronously
///
/// The requested box is checked against `limits` before the source is
/// decoded.
pub fn process_image(
    data: &[u8],
    options: &Options,
    limits: &DimensionLimits,
) -> Result<(Vec<u8>, Format), ImageError> {
    let (box_w, box_h) = target_box(options);
    limits.check_box(box_w, box_h)?;
    // Both sides fit in u32 once check_box has passed.
    let target = (box_w as u32, box_h as u32);

    let source_format = image::guess_format(data)
        .map(format_from_image)
        .unwrap_or_default();
    let mut img = decode_image(data)?;

    img = rotate(img, options.orientation)?;

    if options.crop.is_set() {
        img = crop_area(&img, options)?;
    }

    img = resize_to_fit(img, target, options, limits)?;
    img = adjust(img, options);

    if let Some(background) = options.background {
        if options.fit != Fit::Fill {
            img = composite(&img, background);
        }
    }

    let output_format = if !options.format.is_unknown() {
        options.format
    } else if !source_format.is_unknown() {
        source_format
    } else {
        Format::Jpeg
    };

    let encoded = encode(&img, output_format, options.quality, options.background)?;
    Ok((encoded, output_format))
}

fn decode_image(data: &[u8]) -> Result<DynamicImage, ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

fn rotate(img: DynamicImage, orientation: Orientation) -> Result<DynamicImage, ImageError> {
    match orientation {
        Orientation::D0 => Ok(img),
        Orientation::D90 => Ok(img.rotate90()),
        Orientation::D180 => Ok(img.rotate180()),
        Orientation::D270 => Ok(img.rotate270()),
        other => Err(ImageError::UnsupportedRotation {
            degrees: other.degrees(),
        }),
    }
}

fn crop_area(img: &DynamicImage, options: &Options) -> Result<DynamicImage, ImageError> {
    let x = options.crop.x.max(0) as u32;
    let y = options.crop.y.max(0) as u32;
    if x >= img.width() || y >= img.height() {
        return Err(ImageError::resize_failed("Crop origin outside the image"));
    }

    let width = (options.crop.width as u32).min(img.width() - x);
    let height = (options.crop.height as u32).min(img.height() - y);
    Ok(img.crop_imm(x, y, width, height))
}

/// Target box after the device pixel ratio, 0 meaning "free"
fn target_box(options: &Options) -> (u64, u64) {
    let dpr = options.effective_dpr();
    let scale = |v: u32| (v as f64 * dpr).round() as u64;
    (scale(options.width), scale(options.height))
}

fn resize_to_fit(
    img: DynamicImage,
    (box_w, box_h): (u32, u32),
    options: &Options,
    limits: &DimensionLimits,
) -> Result<DynamicImage, ImageError> {
    if box_w == 0 && box_h == 0 {
        return Ok(img);
    }

    let (src_w, src_h) = (img.width() as f64, img.height() as f64);
    let ratio_w = box_w as f64 / src_w;
    let ratio_h = box_h as f64 / src_h;
    let only_one = box_w == 0 || box_h == 0;
    let single_ratio = if box_w == 0 { ratio_h } else { ratio_w };

    let scaled = |ratio: f64| {
        (
            ((src_w * ratio).round() as u32).max(1),
            ((src_h * ratio).round() as u32).max(1),
        )
    };

    match options.fit {
        Fit::Stretch => {
            let (auto_w, auto_h) = scaled(single_ratio);
            let w = if box_w == 0 { auto_w } else { box_w };
            let h = if box_h == 0 { auto_h } else { box_h };
            resize_exact(&img, w, h, limits)
        }
        Fit::Contain | Fit::Max | Fit::Fill => {
            let mut ratio = if only_one {
                single_ratio
            } else {
                ratio_w.min(ratio_h)
            };
            if options.fit == Fit::Max {
                ratio = ratio.min(1.0);
            }
            let (w, h) = scaled(ratio);
            let resized = resize_exact(&img, w, h, limits)?;

            if options.fit == Fit::Fill && !only_one {
                limits.check_pixels(u64::from(box_w), u64::from(box_h))?;
                Ok(pad(&resized, box_w, box_h, options.background))
            } else {
                Ok(resized)
            }
        }
        crop_fit => {
            if only_one {
                let (w, h) = scaled(single_ratio);
                return resize_exact(&img, w, h, limits);
            }
            let (w, h) = scaled(ratio_w.max(ratio_h));
            let covered = resize_exact(&img, w, h, limits)?;
            let (gx, gy) = crop_fit.gravity();
            let x = ((w.saturating_sub(box_w)) as f64 * gx).round() as u32;
            let y = ((h.saturating_sub(box_h)) as f64 * gy).round() as u32;
            Ok(covered.crop_imm(x, y, box_w.min(w), box_h.min(h)))
        }
    }
}

/// Resize using fast-image-resize with Lanczos3 filter
fn resize_exact(
    img: &DynamicImage,
    target_w: u32,
    target_h: u32,
    limits: &DimensionLimits,
) -> Result<DynamicImage, ImageError> {
    if img.width() == target_w && img.height() == target_h {
        return Ok(img.clone());
    }
    limits.check_pixels(u64::from(target_w), u64::from(target_h))?;

    let src_width =
        NonZeroU32::new(img.width()).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))
}

/// Center `img` on a `width`×`height` canvas
fn pad(img: &DynamicImage, width: u32, height: u32, background: Option<Rgb>) -> DynamicImage {
    let [r, g, b] = background.unwrap_or([255, 255, 255]);
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
    let x = (width.saturating_sub(img.width()) / 2) as i64;
    let y = (height.saturating_sub(img.height()) / 2) as i64;
    image::imageops::overlay(&mut canvas, &img.to_rgba8(), x, y);
    DynamicImage::ImageRgba8(canvas)
}

/// Replace transparency with a solid background
fn composite(img: &DynamicImage, background: Rgb) -> DynamicImage {
    pad(img, img.width(), img.height(), Some(background))
}

fn adjust(mut img: DynamicImage, options: &Options) -> DynamicImage {
    if options.brightness != 0 {
        img = img.brighten(options.brightness);
    }
    if options.contrast != 0 {
        img = img.adjust_contrast(options.contrast as f32);
    }
    if options.gamma > 0.0 && (options.gamma - 1.0).abs() > f64::EPSILON {
        img = apply_gamma(img, options.gamma);
    }
    if options.sharpen > 0 {
        img = img.unsharpen(options.sharpen as f32, 1);
    }
    if options.blur > 0 {
        img = img.blur(0.5 * options.blur as f32);
    }
    img
}

fn apply_gamma(img: DynamicImage, gamma: f64) -> DynamicImage {
    let exponent = 1.0 / gamma;
    let table: Vec<u8> = (0..=255u32)
        .map(|v| ((v as f64 / 255.0).powf(exponent) * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for channel in 0..3 {
            pixel[channel] = table[pixel[channel] as usize];
        }
    }
    DynamicImage::ImageRgba8(rgba)
}
