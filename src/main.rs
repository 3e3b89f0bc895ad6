use clap::Parser;
use flexi_logger::Logger;
use std::path::PathBuf;

use phenoscan::image_loader::collect_inputs;
use phenoscan::{BatchJob, BatchRunner, Pipeline, PipelineConfig, TsvSink};

#[derive(Parser)]
#[command(name = "phenoscan")]
#[command(about = "Segment plants in images and measure shape, color and size")]
struct Cli {
    /// Pipeline configuration (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Image files or directories of images
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Append tab-separated results to this file
    #[arg(long, value_name = "FILE")]
    result: Option<PathBuf>,

    /// Save intermediate images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Save one mask per kept object to directory
    #[arg(long, value_name = "DIR")]
    mask_out: Option<PathBuf>,

    /// Number of images processed in parallel
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let _logger = Logger::try_with_env_or_str(level)?.start()?;

    let config = PipelineConfig::from_json_file(&args.config)?;
    let result_path = args
        .result
        .or_else(|| config.output.result_file.clone())
        .ok_or_else(|| anyhow::anyhow!("no result file given (--result or output.result_file)"))?;
    let debug_dir = args.debug_out.or_else(|| config.output.debug_dir.clone());
    let mask_dir = args.mask_out.or_else(|| config.output.mask_dir.clone());

    let files = collect_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("no supported image files found");
    }
    log::info!("Found {} image(s)", files.len());

    let mut pipeline = Pipeline::new(config)?.with_verbose(args.verbose);
    if let Some(dir) = debug_dir {
        pipeline = pipeline.with_debug(dir)?;
    }

    let mut runner = BatchRunner::from_pipeline(pipeline);
    if let Some(n) = args.jobs {
        runner = runner.with_workers(n);
    }
    if let Some(dir) = mask_dir {
        runner = runner.with_mask_dir(dir)?;
    }

    let sink = TsvSink::open(&result_path)?;
    let jobs: Vec<BatchJob> = files.into_iter().map(BatchJob::new).collect();
    let report = runner.run(&jobs, &sink)?;

    println!("\n=== Results ===");
    println!("Images processed: {}", report.results.len());
    println!("Succeeded: {}", report.succeeded());
    if report.failed() > 0 {
        println!("Failed: {}", report.failed());
        for (job, err) in report.failures() {
            println!("  {} [{}]: {}", job.path.display(), err.kind(), err);
        }
    }
    println!("Results written to {}", result_path.display());

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} image(s) did not complete",
            report.results.len() - report.succeeded(),
            report.results.len()
        );
    }
    Ok(())
}
