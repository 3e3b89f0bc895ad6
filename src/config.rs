//! Configuration bundle for one pipeline setup.
//!
//! A configuration is normally loaded from JSON:
//!
//! ```json
//! {
//!   "mask": {
//!     "op": "fill", "min_size": 200,
//!     "input": { "op": "or", "inputs": [
//!       { "op": "threshold", "channel": "v", "cutoff": 36, "polarity": "light" },
//!       { "op": "threshold", "channel": "b", "cutoff": 130, "polarity": "light" }
//!     ]}
//!   },
//!   "roi": { "region": { "shape": "adjusted", "x_adj": 3800, "w_adj": -500 } },
//!   "analysis": { "color": { "bins": 256 } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::color::DEFAULT_BINS;
use crate::analysis::marker::MarkerConfig;
use crate::error::{PhenoError, Result};
use crate::segmentation::channels::{Background, Channel};
use crate::segmentation::roi::{Containment, RoiShape};
use crate::segmentation::steps::MaskRecipe;

/// Everything needed to turn one image into measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How the plant mask is produced
    pub mask: MaskRecipe,

    #[serde(default)]
    pub roi: RoiConfig,

    #[serde(default)]
    pub composition: CompositionMode,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Main region of interest and the rule for keeping regions in it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoiConfig {
    #[serde(default)]
    pub region: RoiShape,
    #[serde(default)]
    pub containment: Containment,
}

/// Whether kept regions are measured as one subject or one by one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    #[default]
    Combined,
    Individual,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_true")]
    pub shape: bool,
    #[serde(default)]
    pub color: Option<ColorConfig>,
    #[serde(default)]
    pub marker: Option<MarkerConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            shape: true,
            color: None,
            marker: None,
        }
    }
}

fn default_bins() -> u32 {
    DEFAULT_BINS
}

fn default_channels() -> Vec<Channel> {
    Channel::ALL.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorConfig {
    #[serde(default = "default_bins")]
    pub bins: u32,
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
    /// Channel rendered to the debug sink as a pseudocolored image
    #[serde(default)]
    pub pseudocolor: Option<Channel>,
    #[serde(default)]
    pub pseudocolor_background: Background,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            channels: default_channels(),
            pseudocolor: None,
            pseudocolor_background: Background::White,
        }
    }
}

/// Where results and inspection images go; CLI flags take precedence
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub result_file: Option<PathBuf>,
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
    #[serde(default)]
    pub mask_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Configuration that thresholds `mask` and measures shape only over the whole image
    pub fn new(mask: MaskRecipe) -> Self {
        Self {
            mask,
            roi: RoiConfig::default(),
            composition: CompositionMode::default(),
            analysis: AnalysisConfig::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| PhenoError::config(format!("cannot parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PhenoError::config(format!("cannot serialize configuration: {}", e)))
    }

    /// Every check that can run before an image is seen
    pub fn validate(&self) -> Result<()> {
        self.mask.validate()?;
        self.roi.region.validate()?;
        if let Some(color) = &self.analysis.color {
            if color.bins == 0 || color.bins > 256 {
                return Err(PhenoError::config(format!(
                    "histogram bins must be in 1..=256, got {}",
                    color.bins
                )));
            }
            if color.channels.is_empty() {
                return Err(PhenoError::config("color analysis needs at least one channel"));
            }
        }
        if let Some(marker) = &self.analysis.marker {
            marker.validate()?;
        }
        Ok(())
    }
}
