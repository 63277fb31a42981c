use clap::{Parser, Subcommand};
use image_optimizer::config::{self, LoggingConfig, ServiceConfig};
use image_optimizer::imaging::Format;
use image_optimizer::presets::PresetRegistry;
use image_optimizer::process::{Pipeline, PipelineError, UploadRequest, parse_requested_format};
use image_optimizer::storage::{self, FilesystemSink, MemorySink, StorageSink};
use image_optimizer::types::{OptimizationResult, OptimizeResponse};
use image_optimizer::{output, server};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "image-optimizer")]
#[command(about = "Resize, transcode and store uploaded images under named presets")]
#[command(long_about = "\
Resize, transcode and store uploaded images under named presets

Every image is fitted inside its preset's bounding box (never enlarged),
re-encoded to the requested format and written under a unique key:

  optimized-images/{preset}/{unix_millis}-{token}.{ext}

Presets (override in config.toml):

  thumbnail   300x300    q80  webp
  medium      800x800    q85  webp
  large       1200x1200  q90  webp
  original    2000x2000  q95  webp

Run 'image-optimizer gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(
        long,
        default_value = "config.toml",
        env = "IMAGE_OPTIMIZER_CONFIG",
        global = true
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Flags for a one-off optimization run.
#[derive(clap::Args)]
struct OptimizeArgs {
    /// Image files or directories (walked recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Preset to apply: thumbnail, medium, large or original
    #[arg(long, default_value = "large")]
    preset: String,

    /// Output format: webp, jpeg, png, avif or original
    #[arg(long)]
    format: Option<String>,

    /// Quality override, clamped to 1-100
    #[arg(long, allow_negative_numbers = true)]
    quality: Option<i64>,

    /// Store inputs unchanged
    #[arg(long)]
    no_convert: bool,

    /// Write results under this directory instead of the configured storage
    #[arg(long, conflicts_with = "dry_run")]
    out: Option<PathBuf>,

    /// Optimize without storing anything
    #[arg(long)]
    dry_run: bool,

    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve,
    /// Optimize files from disk
    Optimize(OptimizeArgs),
    /// Print the preset table
    Presets,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = config::load_config(&cli.config)?;
            init_tracing(&config.logging, &config.logging.level);
            let sink = storage::open_sink(&config.storage).await?;
            let pipeline = Arc::new(Pipeline::from_config(&config, sink)?);
            server::serve(&config, pipeline).await?;
        }
        Command::Optimize(args) => {
            let config = config::load_config(&cli.config)?;
            // Keep stdout for results; per-image info lines only with RUST_LOG.
            init_tracing(&config.logging, "warn");
            run_optimize(&config, args).await?;
        }
        Command::Presets => {
            let config = config::load_config(&cli.config)?;
            let registry = PresetRegistry::from_config(&config.presets)?;
            output::print_presets(&registry);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
fn init_tracing(logging: &LoggingConfig, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_optimize(
    config: &ServiceConfig,
    args: OptimizeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let sink: Arc<dyn StorageSink> = if args.dry_run {
        Arc::new(MemorySink::new())
    } else if let Some(dir) = &args.out {
        Arc::new(FilesystemSink::new(dir, dir.display().to_string()))
    } else {
        storage::open_sink(&config.storage).await?
    };
    let pipeline = Arc::new(Pipeline::from_config(config, sink)?);
    let preset = pipeline.presets().resolve(&args.preset)?.name;
    let requested_format =
        parse_requested_format(args.format.as_deref(), config.encoding.unknown_format)?;

    let files = collect_inputs(&args.inputs);
    let mut jobs = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        let pipeline = pipeline.clone();
        let convert = !args.no_convert;
        let quality_override = args.quality;
        jobs.spawn(async move {
            let outcome = match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let request = UploadRequest {
                        bytes,
                        declared_mime: mime_for_path(&path).to_string(),
                        preset,
                        convert,
                        requested_format,
                        quality_override,
                    };
                    pipeline.optimize(request).await
                }
                Err(e) => Err(PipelineError::InvalidRequest(format!(
                    "cannot read {}: {e}",
                    path.display()
                ))),
            };
            (index, path, outcome)
        });
    }

    let mut outcomes = jobs.join_all().await;
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut succeeded: Vec<OptimizationResult> = Vec::new();
    let mut failed = 0;
    if args.json {
        let mut responses = Vec::new();
        for (_, path, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    responses.push(serde_json::to_value(OptimizeResponse::from(&result))?);
                }
                Err(e) => {
                    failed += 1;
                    responses.push(serde_json::json!({
                        "source": path.display().to_string(),
                        "error": e.to_string(),
                    }));
                }
            }
        }
        println!("{}", serde_json::to_string_pretty(&responses)?);
    } else {
        for (index, path, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    output::print_result(index + 1, &path, &result);
                    succeeded.push(result);
                }
                Err(e) => {
                    output::print_failure(index + 1, &path, &e);
                    failed += 1;
                }
            }
        }
        output::print_summary(&succeeded, failed);
    }

    if failed > 0 {
        return Err(format!("{failed} image(s) failed").into());
    }
    Ok(())
}

/// Expand directories into the image files beneath them, sorted by path.
/// Explicit file arguments are kept even with an unknown extension so the
/// failure shows up in the report.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| format_for_path(p).is_some())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    files
}

fn format_for_path(path: &Path) -> Option<Format> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(Format::from_extension)
}

fn mime_for_path(path: &Path) -> &'static str {
    format_for_path(path)
        .map(Format::mime_type)
        .unwrap_or("application/octet-stream")
}
