use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{PhenoError, Result};
use crate::mask::Mask;
use crate::pipeline::PipelineContext;
use crate::segmentation::channels::{self, Background, Channel, ChannelAdjustment};
use crate::segmentation::morphology;
use crate::segmentation::threshold::{self, Cutoff, LogicalOp, Polarity};

/// A segmentation stage that turns the source image into a mask
pub trait MaskStep: Send + Sync {
    fn evaluate(&self, image: &RgbImage, context: &PipelineContext) -> Result<Mask>;

    /// Human-readable name for this step (used in logs and debug output)
    fn name(&self) -> &str;
}

fn default_max_value() -> u8 {
    255
}

/// Tree of mask-producing operations.
///
/// Leaves threshold a channel of the image; inner nodes combine or clean up
/// their inputs. A typical recipe is threshold → (and/or) → fill →
/// (dilate → erode | median blur).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MaskRecipe {
    Threshold {
        channel: Channel,
        cutoff: Cutoff,
        polarity: Polarity,
        #[serde(default = "default_max_value")]
        max_value: u8,
        #[serde(default)]
        adjustments: Vec<ChannelAdjustment>,
    },
    And {
        inputs: Vec<MaskRecipe>,
    },
    Or {
        inputs: Vec<MaskRecipe>,
    },
    Fill {
        input: Box<MaskRecipe>,
        min_size: u32,
    },
    Dilate {
        input: Box<MaskRecipe>,
        kernel: u32,
        iterations: u32,
    },
    Erode {
        input: Box<MaskRecipe>,
        kernel: u32,
        iterations: u32,
    },
    MedianBlur {
        input: Box<MaskRecipe>,
        radius: u32,
    },
    /// Evaluate `input` on a copy of the image where everything outside
    /// `mask` is painted with `background`
    WithinMask {
        mask: Box<MaskRecipe>,
        #[serde(default)]
        background: Background,
        input: Box<MaskRecipe>,
    },
}

impl MaskRecipe {
    pub fn threshold(channel: Channel, cutoff: u8, polarity: Polarity) -> Self {
        MaskRecipe::Threshold {
            channel,
            cutoff: Cutoff::Fixed(cutoff),
            polarity,
            max_value: 255,
            adjustments: Vec::new(),
        }
    }

    pub fn fill(self, min_size: u32) -> Self {
        MaskRecipe::Fill {
            input: Box::new(self),
            min_size,
        }
    }

    pub fn dilate(self, kernel: u32, iterations: u32) -> Self {
        MaskRecipe::Dilate {
            input: Box::new(self),
            kernel,
            iterations,
        }
    }

    pub fn erode(self, kernel: u32, iterations: u32) -> Self {
        MaskRecipe::Erode {
            input: Box::new(self),
            kernel,
            iterations,
        }
    }

    pub fn median_blur(self, radius: u32) -> Self {
        MaskRecipe::MedianBlur {
            input: Box::new(self),
            radius,
        }
    }

    /// Reject parameters that would make the recipe meaningless
    pub fn validate(&self) -> Result<()> {
        match self {
            MaskRecipe::Threshold {
                cutoff, max_value, ..
            } => {
                cutoff.validate()?;
                if *max_value == 0 {
                    return Err(PhenoError::config("threshold max_value must be nonzero"));
                }
                Ok(())
            }
            MaskRecipe::And { inputs } | MaskRecipe::Or { inputs } => {
                if inputs.len() < 2 {
                    return Err(PhenoError::config(format!(
                        "'{}' needs at least two inputs, got {}",
                        self.name(),
                        inputs.len()
                    )));
                }
                inputs.iter().try_for_each(MaskRecipe::validate)
            }
            MaskRecipe::Fill { input, .. } => input.validate(),
            MaskRecipe::Dilate {
                input,
                kernel,
                iterations,
            }
            | MaskRecipe::Erode {
                input,
                kernel,
                iterations,
            } => {
                if *kernel == 0 || *iterations == 0 {
                    return Err(PhenoError::config(format!(
                        "'{}' needs a kernel and iteration count of at least 1",
                        self.name()
                    )));
                }
                if kernel % 2 == 0 {
                    return Err(PhenoError::config(format!(
                        "'{}' kernel must be odd, got {}",
                        self.name(),
                        kernel
                    )));
                }
                input.validate()
            }
            MaskRecipe::MedianBlur { input, .. } => input.validate(),
            MaskRecipe::WithinMask { mask, input, .. } => {
                mask.validate()?;
                input.validate()
            }
        }
    }
}

impl MaskStep for MaskRecipe {
    fn evaluate(&self, image: &RgbImage, context: &PipelineContext) -> Result<Mask> {
        let mask = match self {
            MaskRecipe::Threshold {
                channel,
                cutoff,
                polarity,
                max_value,
                adjustments,
            } => {
                let gray = channels::extract_channel(image, *channel);
                let gray = if adjustments.is_empty() {
                    gray
                } else {
                    channels::apply_adjustments(&gray, adjustments)
                };
                context.record(
                    &format!("channel_{}", channel.label()),
                    || DynamicImage::ImageLuma8(gray.clone()),
                );
                let level = cutoff.resolve(&gray);
                context.log_stage(&format!(
                    "threshold {} at {} ({:?})",
                    channel.label(),
                    level,
                    polarity
                ));
                threshold::binary_threshold(&gray, level, *max_value, *polarity)?
            }
            MaskRecipe::And { inputs } => self.combine(inputs, LogicalOp::And, image, context)?,
            MaskRecipe::Or { inputs } => self.combine(inputs, LogicalOp::Or, image, context)?,
            MaskRecipe::Fill { input, min_size } => {
                morphology::fill(&input.evaluate(image, context)?, *min_size)
            }
            MaskRecipe::Dilate {
                input,
                kernel,
                iterations,
            } => morphology::dilate(&input.evaluate(image, context)?, *kernel, *iterations),
            MaskRecipe::Erode {
                input,
                kernel,
                iterations,
            } => morphology::erode(&input.evaluate(image, context)?, *kernel, *iterations),
            MaskRecipe::MedianBlur { input, radius } => {
                morphology::median_blur(&input.evaluate(image, context)?, *radius)
            }
            MaskRecipe::WithinMask {
                mask,
                background,
                input,
            } => {
                let outer = mask.evaluate(image, context)?;
                let masked = channels::apply_mask(image, &outer, *background)?;
                context.record("masked_image", || DynamicImage::ImageRgb8(masked.clone()));
                input.evaluate(&masked, context)?
            }
        };

        context.log_stage(&format!(
            "{}: {} foreground px",
            self.name(),
            mask.foreground_count()
        ));
        context.record(self.name(), || DynamicImage::ImageLuma8(mask.as_gray().clone()));
        Ok(mask)
    }

    fn name(&self) -> &str {
        match self {
            MaskRecipe::Threshold { .. } => "threshold",
            MaskRecipe::And { .. } => "and",
            MaskRecipe::Or { .. } => "or",
            MaskRecipe::Fill { .. } => "fill",
            MaskRecipe::Dilate { .. } => "dilate",
            MaskRecipe::Erode { .. } => "erode",
            MaskRecipe::MedianBlur { .. } => "median_blur",
            MaskRecipe::WithinMask { .. } => "within_mask",
        }
    }
}

impl MaskRecipe {
    fn combine(
        &self,
        inputs: &[MaskRecipe],
        op: LogicalOp,
        image: &RgbImage,
        context: &PipelineContext,
    ) -> Result<Mask> {
        let masks = inputs
            .iter()
            .map(|recipe| recipe.evaluate(image, context))
            .collect::<Result<Vec<_>>>()?;
        threshold::combine_all(&masks, op)
    }
}
