//! Output size guard
//!
//! Every buffer the processor allocates is sized by the request, so the
//! requested box, the `fill` canvas and each resize target are checked here
//! before any pixel memory exists.

use super::error::ImageError;
use crate::constants::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_PIXELS, DEFAULT_MAX_WIDTH};

/// Ceilings for transformed images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_pixels: u64,
}

impl Default for DimensionLimits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl DimensionLimits {
    /// Validate a requested output box; 0 on a side means "derived from the source"
    pub fn check_box(&self, width: u64, height: u64) -> Result<(), ImageError> {
        if width > u64::from(self.max_width) || height > u64::from(self.max_height) {
            return Err(self.exceeded(width, height));
        }
        if width > 0 && height > 0 {
            self.check_pixels(width, height)?;
        }
        Ok(())
    }

    /// Validate the pixel count of a buffer about to be allocated
    pub fn check_pixels(&self, width: u64, height: u64) -> Result<(), ImageError> {
        if width.saturating_mul(height) > self.max_pixels {
            return Err(self.exceeded(width, height));
        }
        Ok(())
    }

    fn exceeded(&self, width: u64, height: u64) -> ImageError {
        ImageError::DimensionsTooLarge {
            width,
            height,
            max_width: self.max_width,
            max_height: self.max_height,
            max_pixels: self.max_pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> DimensionLimits {
        DimensionLimits {
            max_width: 100,
            max_height: 50,
            max_pixels: 4000,
        }
    }

    #[test]
    fn test_check_box_within_limits() {
        assert!(limits().check_box(100, 40).is_ok());
        assert!(limits().check_box(0, 50).is_ok());
        assert!(limits().check_box(0, 0).is_ok());
    }

    #[test]
    fn test_check_box_rejects_each_side() {
        assert!(limits().check_box(101, 0).is_err());
        assert!(limits().check_box(0, 51).is_err());
    }

    #[test]
    fn test_check_box_rejects_pixel_count() {
        let err = limits().check_box(100, 50).unwrap_err();
        assert!(matches!(
            err,
            ImageError::DimensionsTooLarge {
                width: 100,
                height: 50,
                max_pixels: 4000,
                ..
            }
        ));
    }

    #[test]
    fn test_check_pixels_saturates() {
        assert!(limits().check_pixels(u64::MAX, u64::MAX).is_err());
        assert!(limits().check_pixels(4000, 1).is_ok());
    }
}
