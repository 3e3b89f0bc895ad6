use image::{DynamicImage, RgbImage};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::analysis::{analyze_color, analyze_shape, calibrate, pseudocolor};
use crate::config::{CompositionMode, PipelineConfig};
use crate::error::{PhenoError, Result};
use crate::mask::Mask;
use crate::models::{CompositeObject, FieldValue, MeasurementRecord, RecordGroup};
use crate::segmentation::composition::{compose, compose_each};
use crate::segmentation::regions::extract_regions;
use crate::segmentation::roi::{filter_regions, RoiSelection};
use crate::segmentation::steps::MaskStep;

/// Receiver for intermediate images produced while a pipeline runs
pub trait DebugSink: Send + Sync {
    fn record(&self, stage: &str, image: &DynamicImage);
}

/// Writes every recorded image to `dir/NN_stage.png`, numbered in arrival order
pub struct DirectorySink {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl DirectorySink {
    /// The directory must be empty or non-existent
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() {
            if std::fs::read_dir(&dir)?.next().is_some() {
                return Err(PhenoError::config(format!(
                    "debug directory is not empty: {}",
                    dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    /// Create a fresh subdirectory of `root` for `name`; a taken name gets
    /// a `_2`, `_3`, ... suffix
    pub fn claim(root: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let base = sanitize(name);
        let mut n = 1;
        loop {
            let dir = match n {
                1 => root.join(&base),
                _ => root.join(format!("{}_{}", base, n)),
            };
            match std::fs::create_dir(&dir) {
                Ok(()) => {
                    return Ok(Self {
                        dir,
                        counter: AtomicUsize::new(0),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DebugSink for DirectorySink {
    fn record(&self, stage: &str, image: &DynamicImage) {
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("{:02}_{}.png", index, sanitize(stage)));
        match image.save(&path) {
            Ok(()) => debug!("Debug: saved {}", path.display()),
            Err(e) => warn!("Failed to save debug image {}: {}", path.display(), e),
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

/// Context available to all pipeline stages
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<Arc<dyn DebugSink>>,
}

impl PipelineContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            debug: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug = Some(sink);
        self
    }

    /// Hand an intermediate image to the debug sink; `image` is only built when a sink is set
    pub fn record(&self, stage: &str, image: impl FnOnce() -> DynamicImage) {
        if let Some(sink) = &self.debug {
            sink.record(stage, &image());
        }
    }

    pub fn log_stage(&self, message: &str) {
        if self.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

#[derive(Clone)]
enum DebugTarget {
    None,
    /// one subdirectory per run, named after the image id
    Directory(PathBuf),
    Sink(Arc<dyn DebugSink>),
}

/// Everything one image produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub image_id: String,
    /// Mask recipe output before region filtering
    pub mask: Mask,
    pub selection: RoiSelection,
    /// One object in combined mode, one per kept top-level region otherwise
    pub objects: Vec<CompositeObject>,
    pub records: Vec<MeasurementRecord>,
}

impl PipelineOutput {
    pub fn records_of(&self, group: RecordGroup) -> impl Iterator<Item = &MeasurementRecord> {
        self.records.iter().filter(move |r| r.group == group)
    }
}

/// Configured segmentation and measurement run, reusable across images
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    verbose: bool,
    debug: DebugTarget,
}

impl Pipeline {
    /// Validates the configuration up front
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            verbose: false,
            debug: DebugTarget::None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent; each run gets its own subdirectory.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        DirectorySink::new(&output_dir)?;
        self.debug = DebugTarget::Directory(output_dir);
        Ok(self)
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug = DebugTarget::Sink(sink);
        self
    }

    fn context_for(&self, image_id: &str) -> Result<PipelineContext> {
        let context = PipelineContext::new(self.verbose);
        Ok(match &self.debug {
            DebugTarget::None => context,
            DebugTarget::Sink(sink) => context.with_sink(Arc::clone(sink)),
            DebugTarget::Directory(root) => {
                let sink = DirectorySink::claim(root, image_id)?;
                context.with_sink(Arc::new(sink))
            }
        })
    }

    /// Run segmentation only and return the mask recipe's output.
    ///
    /// Debug images go under the `partial` id.
    pub fn run_partial(&self, image: &RgbImage) -> Result<Mask> {
        let context = self.context_for("partial")?;
        context.record("input", || DynamicImage::ImageRgb8(image.clone()));
        let mask = self.config.mask.evaluate(image, &context)?;
        mask.ensure_same_dimensions(image.dimensions())?;
        Ok(mask)
    }

    /// Segment, select, compose and measure one image
    pub fn run(&self, image: &RgbImage, image_id: &str) -> Result<PipelineOutput> {
        let context = self.context_for(image_id)?;
        let (width, height) = image.dimensions();
        context.log_stage(&format!("{}: {}x{}", image_id, width, height));

        // ROI geometry is checked against this image before any pixel work
        let roi = self.config.roi.region.resolve(width, height)?;
        if let Some(marker) = &self.config.analysis.marker {
            marker.roi.resolve(width, height)?;
        }

        context.record("input", || DynamicImage::ImageRgb8(image.clone()));
        let mask = self.config.mask.evaluate(image, &context)?;
        mask.ensure_same_dimensions((width, height))?;

        let regions = extract_regions(&mask);
        let selection = filter_regions(&regions, &roi, self.config.roi.containment);
        context.log_stage(&format!(
            "{} regions, {} kept ({} px)",
            regions.len(),
            selection.regions.len(),
            selection.kept_area
        ));
        context.record("kept", || {
            DynamicImage::ImageLuma8(selection.kept_mask.as_gray().clone())
        });

        let objects = match self.config.composition {
            CompositionMode::Combined => vec![compose(&selection.regions)?],
            CompositionMode::Individual => compose_each(&selection.regions)?,
        };
        for (i, object) in objects.iter().enumerate() {
            context.record(&format!("object_{:02}", i + 1), || {
                DynamicImage::ImageLuma8(object.mask.as_gray().clone())
            });
        }

        let records = self.measure(image, &objects, &context)?;
        info!("{}: {} object(s), {} record(s)", image_id, objects.len(), records.len());

        Ok(PipelineOutput {
            image_id: image_id.to_string(),
            mask,
            selection,
            objects,
            records,
        })
    }

    fn measure(
        &self,
        image: &RgbImage,
        objects: &[CompositeObject],
        context: &PipelineContext,
    ) -> Result<Vec<MeasurementRecord>> {
        let analysis = &self.config.analysis;
        let mut records = Vec::new();

        if analysis.shape {
            for object in objects {
                records.push(analyze_shape(image.dimensions(), object)?);
            }
        }

        if let Some(color) = &analysis.color {
            for object in objects {
                records.push(analyze_color(image, &object.mask, color.bins, &color.channels)?);
                if let Some(channel) = color.pseudocolor {
                    let rendered =
                        pseudocolor(image, &object.mask, channel, color.pseudocolor_background)?;
                    context.record(&format!("pseudocolor_{}", channel.label()), || {
                        DynamicImage::ImageRgb8(rendered)
                    });
                }
            }
        }

        if let Some(marker) = &analysis.marker {
            let calibration = calibrate(image, marker, context)?;
            context.log_stage(&format!(
                "marker {} px, {:.6} {}²/px",
                calibration.marker_area, calibration.area_scale, calibration.unit
            ));
            let mut record = calibration.to_record();
            if analysis.shape {
                let total: u64 = objects.iter().map(CompositeObject::area).sum();
                record.push(
                    "calibrated_area",
                    FieldValue::Float(calibration.physical_area(total)),
                );
            }
            records.push(record);
        }

        Ok(records)
    }
}
