pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod image_loader;
pub mod mask;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod segmentation;

pub use batch::{BatchJob, BatchReport, BatchRunner, ImageOutcome, JobResult};
pub use config::{
    AnalysisConfig, ColorConfig, CompositionMode, OutputConfig, PipelineConfig, RoiConfig,
};
pub use error::{PhenoError, Result};
pub use mask::Mask;
pub use models::{
    CompositeObject, FieldValue, MeasurementRecord, RecordGroup, Region, RegionKind, RegionSet,
};
pub use output::{MemorySink, ResultSink, TsvSink};
pub use pipeline::{DebugSink, DirectorySink, Pipeline, PipelineContext, PipelineOutput};
