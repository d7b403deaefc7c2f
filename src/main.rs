// Command-line entry point: runs one image through the pipeline and prints
// its events as they arrive. The library in lib.rs holds all pipeline logic.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use squeeze_pipeline::{
    ImageDescriptor, MediaFamily, NativeRunner, Pipeline, PipelineConfig, family_algorithms,
    select_operation,
};

/// Compress an image with a chain of external optimizers.
#[derive(Parser, Debug)]
#[command(name = "squeeze", version, about)]
struct Cli {
    /// Image to compress (jpg, png, svg or gif)
    file: PathBuf,

    /// Algorithm to apply; repeat to chain several, in order.
    /// Defaults to every algorithm of the image's family.
    #[arg(short = 'a', long = "algorithm", value_name = "NAME")]
    algorithms: Vec<String>,

    /// Optimize the source file itself instead of a `.min` sibling copy
    #[arg(long)]
    keep_source: bool,

    /// JSON config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds each optimizer may run before it is killed
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Directory containing the optimizer binaries
    #[arg(long, value_name = "DIR")]
    tool_dir: Option<PathBuf>,

    /// Print events and the summary as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)         // Remove file path
        .with_line_number(false)  // Remove line numbers
        .with_thread_ids(false)   // Remove thread IDs
        .with_target(false)       // Remove module path
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(secs) = cli.timeout {
        config.step_timeout_secs = secs;
    }
    if let Some(dir) = cli.tool_dir.clone() {
        config.tool_dir = Some(dir);
    }
    config.validate()?;
    debug!("Using {:?}", config);

    let image = ImageDescriptor::from_path(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;

    let algorithms = if cli.algorithms.is_empty() {
        let family = MediaFamily::detect(&image.media_type)
            .context("unsupported media type")?;
        family_algorithms(family)
            .into_iter()
            .map(|a| a.name().to_string())
            .collect()
    } else {
        cli.algorithms.clone()
    };

    let runner = NativeRunner::new(&config);
    for name in &algorithms {
        if let Some(op) = select_operation(&image.media_type, name) {
            if !runner.is_available(&op) {
                warn!("{} not found, the {} step will fail", op.program(), name);
            }
        }
    }

    let (mut pipeline, mut events) = Pipeline::native(image, algorithms, cli.keep_source, &config);

    while let Some(event) = events.recv().await {
        if cli.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{event}");
        }
    }

    let summary = pipeline.wait().await;
    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        info!(
            "{}: {} -> {} bytes ({:.1}% saved) by [{}]",
            summary.working_path.display(),
            summary.original_size,
            summary.final_size,
            summary.savings,
            summary.completed_algorithms.join(", ")
        );
        for err in &summary.errors {
            warn!("{}: {}", err.algorithm, err.message);
        }
    }

    if let Some(err) = pipeline.setup_error() {
        bail!(err);
    }
    Ok(())
}
