//! Transform parameter types and their lenient parsers
//!
//! Every parser here degrades instead of failing: a bad numeric value becomes
//! zero, a bad enum value becomes its default. A single malformed parameter
//! must never reject the whole request.

use std::fmt;
use std::str::FromStr;

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Keep the source format
    #[default]
    Unknown,
    Jpeg,
    Png,
    Webp,
    Tiff,
    Gif,
    Svg,
    Pdf,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Unknown => "application/octet-stream",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Tiff => "image/tiff",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Format::Jpeg),
            "png" => Ok(Format::Png),
            "webp" => Ok(Format::Webp),
            "tiff" | "tif" => Ok(Format::Tiff),
            "gif" => Ok(Format::Gif),
            "svg" => Ok(Format::Svg),
            "pdf" => Ok(Format::Pdf),
            other => Err(format!("unknown format: {}", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the image is fitted into the requested box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Fit {
    /// Scale to fit within the box, preserving aspect ratio
    #[default]
    Contain,
    /// Like contain but never enlarges
    Max,
    /// Scale to fit, then pad the box with the background color
    Fill,
    /// Force the exact box, ignoring aspect ratio
    Stretch,
    CropTopLeft,
    CropTop,
    CropTopRight,
    CropLeft,
    CropCenter,
    CropRight,
    CropBottomLeft,
    CropBottom,
    CropBottomRight,
    CropFocalPoint,
}

impl Fit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contain => "contain",
            Self::Max => "max",
            Self::Fill => "fill",
            Self::Stretch => "stretch",
            Self::CropTopLeft => "crop-top-left",
            Self::CropTop => "crop-top",
            Self::CropTopRight => "crop-top-right",
            Self::CropLeft => "crop-left",
            Self::CropCenter => "crop-center",
            Self::CropRight => "crop-right",
            Self::CropBottomLeft => "crop-bottom-left",
            Self::CropBottom => "crop-bottom",
            Self::CropBottomRight => "crop-bottom-right",
            Self::CropFocalPoint => "crop-focal-point",
        }
    }

    /// Whether the image covers the box and is then cut down to it
    pub fn is_crop(&self) -> bool {
        !matches!(
            self,
            Self::Contain | Self::Max | Self::Fill | Self::Stretch
        )
    }

    /// Horizontal and vertical anchor of a crop, each in 0.0..=1.0
    pub fn gravity(&self) -> (f64, f64) {
        match self {
            Self::CropTopLeft => (0.0, 0.0),
            Self::CropTop => (0.5, 0.0),
            Self::CropTopRight => (1.0, 0.0),
            Self::CropLeft => (0.0, 0.5),
            Self::CropRight => (1.0, 0.5),
            Self::CropBottomLeft => (0.0, 1.0),
            Self::CropBottom => (0.5, 1.0),
            Self::CropBottomRight => (1.0, 1.0),
            _ => (0.5, 0.5),
        }
    }
}

impl FromStr for Fit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contain" => Ok(Fit::Contain),
            "max" => Ok(Fit::Max),
            "fill" => Ok(Fit::Fill),
            "stretch" => Ok(Fit::Stretch),
            "crop" | "crop-center" => Ok(Fit::CropCenter),
            "crop-top-left" => Ok(Fit::CropTopLeft),
            "crop-top" => Ok(Fit::CropTop),
            "crop-top-right" => Ok(Fit::CropTopRight),
            "crop-left" => Ok(Fit::CropLeft),
            "crop-right" => Ok(Fit::CropRight),
            "crop-bottom-left" => Ok(Fit::CropBottomLeft),
            "crop-bottom" => Ok(Fit::CropBottom),
            "crop-bottom-right" => Ok(Fit::CropBottomRight),
            "crop-focal-point" => Ok(Fit::CropFocalPoint),
            other => Err(format!("unknown fit mode: {}", other)),
        }
    }
}

/// Rotation applied before any other transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    D0,
    D45,
    D90,
    D135,
    D180,
    D225,
    D270,
    D315,
}

impl Orientation {
    pub fn degrees(&self) -> u16 {
        match self {
            Self::D0 => 0,
            Self::D45 => 45,
            Self::D90 => 90,
            Self::D135 => 135,
            Self::D180 => 180,
            Self::D225 => 225,
            Self::D270 => 270,
            Self::D315 => 315,
        }
    }

    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees {
            0 => Some(Self::D0),
            45 => Some(Self::D45),
            90 => Some(Self::D90),
            135 => Some(Self::D135),
            180 => Some(Self::D180),
            225 => Some(Self::D225),
            270 => Some(Self::D270),
            315 => Some(Self::D315),
            _ => None,
        }
    }
}

/// Crop rectangle; `-1` marks a component that was not given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crop {
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
}

impl Crop {
    pub const UNSET: i32 = -1;

    /// A crop is applied only when it has a positive area
    pub fn is_set(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            width: Self::UNSET,
            height: Self::UNSET,
            x: Self::UNSET,
            y: Self::UNSET,
        }
    }
}

/// Parse a float, returning its absolute value or 0 when unparseable
pub fn parse_float(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v.abs(),
        _ => 0.0,
    }
}

/// Parse a non-negative integer, rounding fractional input half up
pub fn parse_int(value: &str) -> u32 {
    let rounded = (parse_float(value) + 0.5).floor();
    if rounded >= u32::MAX as f64 {
        u32::MAX
    } else {
        rounded as u32
    }
}

/// Parse a signed integer, rounding fractional input to the nearest value
pub fn parse_signed(value: &str) -> i32 {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32,
        _ => 0,
    }
}

/// Parse `width,height,x,y`
///
/// Anything other than exactly four components leaves the whole rectangle
/// unset; a single bad component is unset on its own.
pub fn parse_crop(value: &str) -> Crop {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 4 {
        return Crop::default();
    }

    let component = |s: &str| s.trim().parse::<i32>().unwrap_or(Crop::UNSET);
    Crop {
        width: component(parts[0]),
        height: component(parts[1]),
        x: component(parts[2]),
        y: component(parts[3]),
    }
}

/// Parse a rotation, falling back to 0 degrees
pub fn parse_orientation(value: &str) -> Orientation {
    Orientation::from_degrees(parse_int(value) as i64).unwrap_or_default()
}
