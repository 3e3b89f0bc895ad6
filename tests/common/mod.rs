mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from phenoscan for tests
pub use phenoscan::segmentation::{Channel, MaskRecipe, Polarity, RoiShape};
pub use phenoscan::{Mask, PipelineConfig};
