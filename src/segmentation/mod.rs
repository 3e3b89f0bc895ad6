//! Segmentation stage: channel → threshold → cleanup → regions → ROI → composite

pub mod channels;
pub mod composition;
pub mod morphology;
pub mod regions;
pub mod roi;
pub mod steps;
pub mod threshold;

pub use channels::{apply_mask, extract_channel, Background, Channel, ChannelAdjustment};
pub use composition::{compose, compose_each};
pub use regions::extract_regions;
pub use roi::{filter_regions, Containment, ResolvedRoi, RoiSelection, RoiShape};
pub use steps::{MaskRecipe, MaskStep};
pub use threshold::{binary_threshold, combine, Cutoff, LogicalOp, Polarity};
