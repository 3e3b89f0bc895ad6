use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::analysis::shape::{Ellipse, PixelMoments};
use crate::error::{PhenoError, Result};
use crate::mask::Mask;
use crate::models::{FieldValue, MeasurementRecord, RecordGroup, RegionKind};
use crate::pipeline::PipelineContext;
use crate::segmentation::channels::{apply_mask, extract_channel, Background, Channel};
use crate::segmentation::regions::extract_regions;
use crate::segmentation::roi::{filter_regions, Containment, RoiShape};
use crate::segmentation::threshold::{binary_threshold, Polarity};

/// How the reference object is found inside the marker ROI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MarkerDetection {
    /// Threshold one channel inside the ROI and take what survives
    Detect {
        channel: Channel,
        cutoff: u8,
        polarity: Polarity,
    },
    /// The ROI itself is the marker
    Define,
}

fn default_unit() -> String {
    "cm".to_string()
}

fn default_min_area() -> u64 {
    10
}

/// Reference object of known physical size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    pub roi: RoiShape,
    pub detection: MarkerDetection,
    /// Paint used outside the ROI before thresholding; pick the color that
    /// does not pass the marker threshold
    #[serde(default)]
    pub background: Background,
    /// Physical area of the marker, in `unit`²
    pub physical_area: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Smallest pixel area accepted as a marker
    #[serde(default = "default_min_area")]
    pub min_area: u64,
}

impl MarkerConfig {
    pub fn validate(&self) -> Result<()> {
        self.roi.validate()?;
        if !(self.physical_area.is_finite() && self.physical_area > 0.0) {
            return Err(PhenoError::config(format!(
                "marker physical_area must be positive, got {}",
                self.physical_area
            )));
        }
        Ok(())
    }
}

/// Pixel → physical unit conversion derived from the marker
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub marker_area: u64,
    pub ellipse: Ellipse,
    pub unit: String,
    /// unit² per pixel
    pub area_scale: f64,
    /// unit per pixel side
    pub length_scale: f64,
}

impl Calibration {
    /// Convert a pixel area to `unit`²
    pub fn physical_area(&self, pixels: u64) -> f64 {
        pixels as f64 * self.area_scale
    }

    pub fn to_record(&self) -> MeasurementRecord {
        MeasurementRecord::new(RecordGroup::Marker)
            .with("marker_area", FieldValue::Int(self.marker_area as i64))
            .with("marker_major_axis", FieldValue::Float(self.ellipse.major_axis))
            .with("marker_minor_axis", FieldValue::Float(self.ellipse.minor_axis))
            .with("marker_eccentricity", FieldValue::Float(self.ellipse.eccentricity))
            .with("unit", FieldValue::Text(self.unit.clone()))
            .with("area_scale", FieldValue::Float(self.area_scale))
            .with("length_scale", FieldValue::Float(self.length_scale))
    }
}

/// Locate the size marker and derive the pixel scale.
///
/// Fails with `MarkerNotFound` instead of falling back to a unit scale.
pub fn calibrate(
    image: &RgbImage,
    config: &MarkerConfig,
    context: &PipelineContext,
) -> Result<Calibration> {
    config.validate()?;
    let (width, height) = image.dimensions();
    let roi = config.roi.resolve(width, height)?;
    let roi_mask = roi.to_mask(width, height);

    let marker_mask = match &config.detection {
        MarkerDetection::Define => roi_mask,
        MarkerDetection::Detect {
            channel,
            cutoff,
            polarity,
        } => {
            let isolated = apply_mask(image, &roi_mask, config.background)?;
            let gray = extract_channel(&isolated, *channel);
            let thresholded = binary_threshold(&gray, *cutoff, 255, *polarity)?;
            context.record("marker_threshold", || {
                DynamicImage::ImageLuma8(thresholded.as_gray().clone())
            });

            let selection =
                filter_regions(&extract_regions(&thresholded), &roi, Containment::Partial);
            let regions = &selection.regions;
            let mut keep = vec![false; regions.len()];
            for (i, region) in regions.iter().enumerate() {
                keep[i] = match region.kind {
                    RegionKind::Outer => region.area() >= config.min_area,
                    RegionKind::Hole => region.parent.is_some_and(|p| keep[p]),
                };
            }
            let indices: Vec<usize> = (0..regions.len()).filter(|&i| keep[i]).collect();
            regions.subset(&indices).rasterize()
        }
    };
    context.record("marker", || DynamicImage::ImageLuma8(marker_mask.as_gray().clone()));

    measure_marker(&marker_mask, config)
}

fn measure_marker(marker: &Mask, config: &MarkerConfig) -> Result<Calibration> {
    let moments = PixelMoments::from_mask(marker)
        .filter(|m| m.count >= config.min_area)
        .ok_or(PhenoError::MarkerNotFound {
            min_area: config.min_area,
        })?;

    let area_scale = config.physical_area / moments.count as f64;
    Ok(Calibration {
        marker_area: moments.count,
        ellipse: moments.ellipse(),
        unit: config.unit.clone(),
        area_scale,
        length_scale: area_scale.sqrt(),
    })
}
