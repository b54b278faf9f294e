use clap::{Parser, Subcommand};
use downsize::config::{self, DownsizeConfig};
use downsize::imaging::{
    EdgeConstraint, ImageKind, PixelSize, calculate_target_size, clamp_to_pixel_budget,
    max_pixel_dimension,
};
use downsize::process::{self, Downsizer, Mode};
use downsize::{output, scan};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crate version on a release tag, `dev@<hash>` otherwise.
fn version_string() -> &'static str {
    if env!("DOWNSIZE_RELEASE") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("DOWNSIZE_GIT_HASH") {
        "" => "dev@unknown",
        // Called once per process
        hash => Box::leak(format!("dev@{hash}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "downsize")]
#[command(about = "Memory-bounded image downscaling and re-encoding")]
#[command(long_about = "\
Memory-bounded image downscaling and re-encoding

Shrinks photos to a target size without ever decoding more pixels than a
fixed budget allows, then re-encodes them with their metadata.

Sizing (applied in order, never enlarges):

  1. short edge  --short-edge 1500   4000x3000 → 2000x1500
  2. long edge   --long-edge 1800    2000x1500 → 1800x1350
  3. budget      --pixel-budget N    shrink further until width*height <= N

Output format:

  shrink     same format as the input (HEIC, AVIF, PNG, JPEG, GIF),
             anything else becomes JPEG
  reencode   the configured preferred format (default HEIC)

Whenever an encoder is unavailable the output falls back to JPEG. Files that
cannot be processed at all are copied through unchanged.

Run 'downsize gen-config' to generate a documented downsize.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Sizing flags shared by every command that computes a target size.
#[derive(clap::Args, Clone)]
struct LimitArgs {
    /// Maximum short edge
    #[arg(long)]
    short_edge: Option<f64>,

    /// Maximum long edge
    #[arg(long)]
    long_edge: Option<f64>,

    /// Maximum width × height of the decoded image
    #[arg(long)]
    pixel_budget: Option<u64>,

    /// Treat --short-edge/--long-edge as points on a display with this pixel density
    #[arg(long)]
    scale: Option<f64>,
}

/// Flags for commands that process images.
#[derive(clap::Args, Clone)]
struct ProcessArgs {
    /// Image files or directories (searched recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "downsized")]
    output: PathBuf,

    #[command(flatten)]
    limits: LimitArgs,

    /// Lossy quality factor (0.0-1.0)
    #[arg(long)]
    quality: Option<f64>,

    /// Preferred output format for `reencode`
    #[arg(long)]
    format: Option<ImageKind>,

    /// Rotate pixels upright according to EXIF orientation
    #[arg(long)]
    preserve_orientation: bool,

    /// Print a JSON report instead of progress lines
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a bounded thumbnail and re-encode it in the input's format
    Shrink(ProcessArgs),
    /// Re-encode sources into the preferred format at the computed size
    Reencode(ProcessArgs),
    /// Show the size calculation for given dimensions
    Size {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Show format, dimensions and metadata of image files
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a stock downsize.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    match &cli.command {
        Command::Shrink(args) => run_batch(&cli, args, Mode::Shrink)?,
        Command::Reencode(args) => run_batch(&cli, args, Mode::Reencode)?,
        Command::Size {
            width,
            height,
            limits,
        } => {
            let config = resolve_config(&cli, limit_overlay(limits))?;
            let constraint = edge_constraint(&config, limits);
            let original = PixelSize::from((*width, *height));
            let constrained = calculate_target_size(original, constraint);
            let budget = config.pixel_budget as f64;
            let decoded = clamp_to_pixel_budget(constrained, budget);
            for line in output::format_size_report(
                original,
                constrained,
                decoded,
                budget,
                max_pixel_dimension(decoded),
            ) {
                println!("{}", line);
            }
        }
        Command::Inspect { files, json } => {
            let mut reports = Vec::new();
            for path in files {
                let data = std::fs::read(path)?;
                let properties = process::inspect(&data);
                if *json {
                    reports.push(serde_json::json!({ "path": path, "properties": properties }));
                } else {
                    output::print_properties(path, &properties);
                }
            }
            if *json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the tracing subscriber. Logs go to stderr so `--json` output on
/// stdout stays machine-readable.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run_batch(cli: &Cli, args: &ProcessArgs, mode: Mode) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(cli, process_overlay(args))?;
    init_thread_pool(&config.processing);
    let constraint = edge_constraint(&config, &args.limits);
    let inputs = scan::collect_inputs(&args.inputs)?;
    let downsizer = Downsizer::new(config);

    if args.json {
        let result = process::process_files(&downsizer, &inputs, &args.output, mode, &constraint, None)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::process_files(
        &downsizer,
        &inputs,
        &args.output,
        mode,
        &constraint,
        Some(tx),
    )?;
    printer.join().map_err(|_| "output thread panicked")?;
    output::print_batch_summary(&result.summary);
    Ok(())
}

/// Stock defaults, then `--config`, then command-line flags.
fn resolve_config(
    cli: &Cli,
    flags: toml::Table,
) -> Result<DownsizeConfig, config::ConfigError> {
    let file = cli.config.as_deref().map(config::load_raw_config).transpose()?;
    config::resolve_config(file.into_iter().chain([toml::Value::Table(flags)]))
}

fn limit_overlay(limits: &LimitArgs) -> toml::Table {
    let mut root = toml::Table::new();
    let mut constraint = toml::Table::new();
    if let Some(edge) = limits.short_edge {
        constraint.insert("short_edge".into(), toml::Value::Float(edge));
    }
    if let Some(edge) = limits.long_edge {
        constraint.insert("long_edge".into(), toml::Value::Float(edge));
    }
    if !constraint.is_empty() {
        root.insert("constraint".into(), toml::Value::Table(constraint));
    }
    if let Some(budget) = limits.pixel_budget {
        let budget = i64::try_from(budget).unwrap_or(i64::MAX);
        root.insert("pixel_budget".into(), toml::Value::Integer(budget));
    }
    root
}

fn process_overlay(args: &ProcessArgs) -> toml::Table {
    let mut root = limit_overlay(&args.limits);
    if let Some(quality) = args.quality {
        root.insert("quality".into(), toml::Value::Float(quality));
    }
    if let Some(format) = args.format {
        root.insert("preferred_format".into(), toml::Value::String(format.to_string()));
    }
    if args.preserve_orientation {
        root.insert("preserve_orientation".into(), toml::Value::Boolean(true));
    }
    root
}

/// The configured constraint. With `--scale`, edges given on the command line
/// are points; edges from the config file are pixels either way.
fn edge_constraint(config: &DownsizeConfig, limits: &LimitArgs) -> EdgeConstraint {
    match limits.scale {
        Some(scale) => {
            config.edge_constraint_with_points(limits.short_edge, limits.long_edge, scale)
        }
        None => config.edge_constraint(),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
