//! Error types for the phenoscan pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for phenoscan operations
pub type Result<T> = std::result::Result<T, PhenoError>;

/// Every way a single image's pipeline run can fail
#[derive(Error, Debug)]
pub enum PhenoError {
    /// Invalid channel, threshold, morphology or ROI parameters
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    /// Two rasters that must line up have different sizes
    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// The ROI filter kept no regions, so there is nothing to compose
    #[error("No object found inside the region of interest")]
    EmptyComposition,

    /// Measurement attempted on an object without foreground pixels
    #[error("Cannot measure an empty object")]
    EmptyObject,

    /// The size marker ROI holds no region large enough to calibrate with
    #[error("No size marker of at least {min_area} px found in the marker ROI")]
    MarkerNotFound { min_area: u64 },

    /// The image loader could not decode the input file
    #[error("Failed to decode image {}: {source}", .path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A mask or debug image could not be written
    #[error("Failed to save image {}: {source}", .path.display())]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The result sink could not serialise a row
    #[error("Failed to write results: {0}")]
    Output(#[from] csv::Error),
}

impl PhenoError {
    /// Build a configuration error from anything printable
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this failure only concerns the image that raised it.
    ///
    /// Sink failures (I/O, serialisation) may affect every image sharing the sink.
    pub fn is_per_image(&self) -> bool {
        !matches!(self, PhenoError::Io(_) | PhenoError::Output(_))
    }

    /// Short machine-friendly tag for the failure kind, used in batch reports
    pub fn kind(&self) -> &'static str {
        match self {
            PhenoError::Configuration { .. } => "configuration",
            PhenoError::ShapeMismatch { .. } => "shape_mismatch",
            PhenoError::EmptyComposition => "empty_composition",
            PhenoError::EmptyObject => "empty_object",
            PhenoError::MarkerNotFound { .. } => "marker_not_found",
            PhenoError::ImageDecode { .. } => "image_decode",
            PhenoError::ImageEncode { .. } => "image_encode",
            PhenoError::Io(_) => "io",
            PhenoError::Output(_) => "output",
        }
    }
}
