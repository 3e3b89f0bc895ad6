use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{PhenoError, Result};
use crate::mask::Mask;

/// Which side of the cutoff counts as foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// keep `v >= cutoff`
    Light,
    /// keep `v <= cutoff`
    Dark,
}

/// Cutoff given as a level, or relative to the brightest value of the channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cutoff {
    Fixed(u8),
    Relative { fraction_of_max: f32 },
}

impl Cutoff {
    pub fn validate(&self) -> Result<()> {
        if let Cutoff::Relative { fraction_of_max } = self {
            if !(*fraction_of_max > 0.0 && *fraction_of_max <= 1.0) {
                return Err(PhenoError::config(format!(
                    "fraction_of_max must be in (0, 1], got {}",
                    fraction_of_max
                )));
            }
        }
        Ok(())
    }

    /// Concrete level for this channel
    pub fn resolve(&self, gray: &GrayImage) -> u8 {
        match self {
            Cutoff::Fixed(level) => *level,
            Cutoff::Relative { fraction_of_max } => {
                let max = gray.pixels().map(|p| p[0]).max().unwrap_or(0);
                (max as f32 * fraction_of_max).floor() as u8
            }
        }
    }
}

/// Binarize a grayscale channel.
///
/// `max_value` is the foreground level and must be nonzero; the resulting
/// mask always stores foreground as 255.
pub fn binary_threshold(
    gray: &GrayImage,
    cutoff: u8,
    max_value: u8,
    polarity: Polarity,
) -> Result<Mask> {
    if max_value == 0 {
        return Err(PhenoError::config("threshold max_value must be nonzero"));
    }
    let (width, height) = gray.dimensions();
    Ok(Mask::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0];
        match polarity {
            Polarity::Light => v >= cutoff,
            Polarity::Dark => v <= cutoff,
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

/// Pixel-wise AND/OR of two masks of identical size
pub fn combine(a: &Mask, b: &Mask, op: LogicalOp) -> Result<Mask> {
    a.ensure_same_dimensions(b.dimensions())?;
    let (width, height) = a.dimensions();
    Ok(Mask::from_fn(width, height, |x, y| {
        let (fa, fb) = (a.is_foreground(x, y), b.is_foreground(x, y));
        match op {
            LogicalOp::And => fa && fb,
            LogicalOp::Or => fa || fb,
        }
    }))
}

/// Fold `combine` over two or more masks
pub fn combine_all(masks: &[Mask], op: LogicalOp) -> Result<Mask> {
    let (first, rest) = masks
        .split_first()
        .ok_or_else(|| PhenoError::config("mask combination needs at least one input"))?;
    rest.iter()
        .try_fold(first.clone(), |acc, next| combine(&acc, next, op))
}
