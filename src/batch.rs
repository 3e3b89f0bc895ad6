//! Many images through one pipeline on a worker pool

use image::DynamicImage;
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::PipelineConfig;
use crate::error::{PhenoError, Result};
use crate::image_loader::{image_id, load_image};
use crate::models::MeasurementRecord;
use crate::output::ResultSink;
use crate::pipeline::{Pipeline, PipelineOutput};

/// One image to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub path: PathBuf,
}

impl BatchJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn image_id(&self) -> String {
        image_id(&self.path)
    }
}

#[derive(Debug)]
pub enum ImageOutcome {
    Succeeded { records: Vec<MeasurementRecord> },
    Failed(PhenoError),
    /// Skipped because the batch was cancelled before it started
    Cancelled,
}

#[derive(Debug)]
pub struct JobResult {
    pub job: BatchJob,
    pub outcome: ImageOutcome,
}

/// Outcomes in job order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Failed(_)))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Cancelled))
    }

    pub fn is_success(&self) -> bool {
        self.succeeded() == self.results.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&BatchJob, &PhenoError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            ImageOutcome::Failed(err) => Some((&r.job, err)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&ImageOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct BatchRunner {
    pipeline: Pipeline,
    workers: Option<usize>,
    mask_dir: Option<PathBuf>,
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self::from_pipeline(Pipeline::new(config)?))
    }

    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            workers: None,
            mask_dir: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Worker count; defaults to the available parallelism
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Write each kept object's mask as `<image>_object_NN.png` into `dir`
    pub fn with_mask_dir(mut self, dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        self.mask_dir = Some(dir);
        Ok(self)
    }

    /// Raising the flag stops new images from starting; running ones finish
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn run(&self, jobs: &[BatchJob], sink: &dyn ResultSink) -> Result<BatchReport> {
        let workers = self
            .workers
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| PhenoError::config(format!("failed to build worker pool: {}", e)))?;
        info!("Processing {} image(s) on {} worker(s)", jobs.len(), workers);

        let done = AtomicUsize::new(0);
        let results = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let outcome = if self.cancel.load(Ordering::SeqCst) {
                        ImageOutcome::Cancelled
                    } else {
                        match self.process(job, sink) {
                            Ok(records) => ImageOutcome::Succeeded { records },
                            Err(err) => {
                                warn!("{}: {}", job.path.display(), err);
                                ImageOutcome::Failed(err)
                            }
                        }
                    };
                    let count = done.fetch_add(1, Ordering::SeqCst) + 1;
                    info!("[{}/{}] {}", count, jobs.len(), job.path.display());
                    JobResult {
                        job: job.clone(),
                        outcome,
                    }
                })
                .collect::<Vec<_>>()
        });

        let report = BatchReport { results };
        info!(
            "Batch finished: {} succeeded, {} failed, {} cancelled",
            report.succeeded(),
            report.failed(),
            report.cancelled()
        );
        Ok(report)
    }

    fn process(&self, job: &BatchJob, sink: &dyn ResultSink) -> Result<Vec<MeasurementRecord>> {
        let id = job.image_id();
        let image = load_image(&job.path)?;
        let output = self.pipeline.run(&image, &id)?;
        if let Some(dir) = &self.mask_dir {
            write_object_masks(dir, &output)?;
        }
        sink.emit(&id, &output.records)?;
        Ok(output.records)
    }
}

/// One PNG per composite object, numbered in raster order
pub fn write_object_masks(dir: &Path, output: &PipelineOutput) -> Result<Vec<PathBuf>> {
    let stem = Path::new(&output.image_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.image_id.clone());
    let mut written = Vec::with_capacity(output.objects.len());
    for (i, object) in output.objects.iter().enumerate() {
        let path = dir.join(format!("{}_object_{:02}.png", stem, i + 1));
        DynamicImage::ImageLuma8(object.mask.as_gray().clone())
            .save(&path)
            .map_err(|source| PhenoError::ImageEncode {
                path: path.clone(),
                source,
            })?;
        written.push(path);
    }
    Ok(written)
}
