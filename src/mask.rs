use image::{GrayImage, Luma};

use crate::error::{PhenoError, Result};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Binary raster separating the subject (255) from background (0).
///
/// Every constructor binarizes, so no other value can ever be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// All-background mask
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Binarize a grayscale raster: any nonzero value becomes foreground
    pub fn from_gray(gray: &GrayImage) -> Self {
        let mut out = gray.clone();
        for p in out.pixels_mut() {
            p[0] = if p[0] > 0 { FOREGROUND } else { BACKGROUND };
        }
        Self(out)
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if f(x, y) { FOREGROUND } else { BACKGROUND }])
        }))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        self.0.put_pixel(
            x,
            y,
            Luma([if foreground { FOREGROUND } else { BACKGROUND }]),
        );
    }

    pub fn foreground_count(&self) -> u64 {
        self.0.pixels().filter(|p| p[0] == FOREGROUND).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.0.pixels().all(|p| p[0] == BACKGROUND)
    }

    /// Fail with `ShapeMismatch` unless both rasters have the same size
    pub fn ensure_same_dimensions(&self, other: (u32, u32)) -> Result<()> {
        if self.dimensions() != other {
            return Err(PhenoError::ShapeMismatch {
                expected: self.dimensions(),
                found: other,
            });
        }
        Ok(())
    }

    /// Pixel-wise complement
    pub fn inverted(&self) -> Self {
        let mut out = self.0.clone();
        for p in out.pixels_mut() {
            p[0] = FOREGROUND - p[0];
        }
        Self(out)
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_gray(self) -> GrayImage {
        self.0
    }
}
