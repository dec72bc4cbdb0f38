//! The transform options value object and its cache digest

use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use super::color::{format_color, parse_color, Rgb};
use super::params::{
    parse_crop, parse_float, parse_int, parse_orientation, parse_signed, Crop, Fit, Format,
    Orientation,
};

/// Error for a query string that cannot be decoded at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct OptionsError(pub String);

/// The transform parameters of one request
///
/// Fields are filled by the negotiation pipeline and then frozen behind an
/// `Arc`. `hash()` memoizes the digest on first use, so fields must not change
/// once it has been called; `clone()` drops the memo.
#[derive(Debug, Default)]
pub struct Options {
    pub width: u32,
    pub height: u32,
    pub dpr: f64,
    pub fit: Fit,
    pub quality: u8,
    pub format: Format,
    pub orientation: Orientation,
    pub crop: Crop,
    pub background: Option<Rgb>,
    pub brightness: i32,
    pub contrast: i32,
    pub gamma: f64,
    pub sharpen: u32,
    pub blur: u32,
    digest: OnceLock<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (without the leading `?`)
    ///
    /// Unknown keys are ignored, bad values fall back per field. Only a
    /// component that does not percent-decode to UTF-8 fails the parse.
    pub fn from_query(query: &str) -> Result<Self, OptionsError> {
        let mut options = Options::default();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key)?;
            let value = decode_component(raw_value)?;
            options.apply(&key, &value);
        }

        Ok(options)
    }

    /// Set one field from its query key
    pub fn apply(&mut self, key: &str, value: &str) {
        match key {
            "w" => self.width = parse_int(value),
            "h" => self.height = parse_int(value),
            "dpr" => self.dpr = parse_float(value),
            "fit" => self.fit = value.parse().unwrap_or_default(),
            "q" => self.quality = parse_int(value).min(100) as u8,
            "fm" => self.format = value.parse().unwrap_or_default(),
            "or" => self.orientation = parse_orientation(value),
            "crop" => self.crop = parse_crop(value),
            "bg" => self.background = parse_color(value),
            "bri" => self.brightness = parse_signed(value),
            "con" => self.contrast = parse_signed(value),
            "gam" => self.gamma = parse_float(value),
            "sharp" => self.sharpen = parse_int(value),
            "blur" => self.blur = parse_int(value),
            _ => {}
        }
    }

    /// Device pixel ratio actually applied; 0 means "not given" and acts as 1
    pub fn effective_dpr(&self) -> f64 {
        if self.dpr > 0.0 {
            self.dpr
        } else {
            1.0
        }
    }

    /// Hex SHA-256 over every field that influences the output bytes
    pub fn hash(&self) -> &str {
        self.digest.get_or_init(|| {
            let digest = Sha256::digest(self.canonical().as_bytes());
            hex::encode(digest)
        })
    }

    fn canonical(&self) -> String {
        format!(
            "w={}&h={}&fit={}&q={}&fm={}&dpr={:.6}&or={}&bg={}&bri={}&con={}&gam={:.6}&sharp={}&blur={}&crop={},{},{},{}",
            self.width,
            self.height,
            self.fit.as_str(),
            self.quality,
            self.format.as_str(),
            self.effective_dpr(),
            self.orientation.degrees(),
            format_color(self.background),
            self.brightness,
            self.contrast,
            self.gamma,
            self.sharpen,
            self.blur,
            self.crop.width,
            self.crop.height,
            self.crop.x,
            self.crop.y,
        )
    }
}

impl Clone for Options {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            dpr: self.dpr,
            fit: self.fit,
            quality: self.quality,
            format: self.format,
            orientation: self.orientation,
            crop: self.crop,
            background: self.background,
            brightness: self.brightness,
            contrast: self.contrast,
            gamma: self.gamma,
            sharpen: self.sharpen,
            blur: self.blur,
            digest: OnceLock::new(),
        }
    }
}

impl PartialEq for Options {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

fn decode_component(raw: &str) -> Result<String, OptionsError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| OptionsError(format!("invalid query component {:?}: {}", raw, e)))
}
