//! Measurement stage: shape, color and size-marker calibration

pub mod color;
pub mod marker;
pub mod shape;

pub use color::{analyze_color, pseudocolor, ChannelHistogram, DEFAULT_BINS};
pub use marker::{calibrate, Calibration, MarkerConfig, MarkerDetection};
pub use shape::{analyze_shape, Ellipse, PixelMoments};
