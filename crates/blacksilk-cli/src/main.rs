//! blacksilk - black and white film look processing
//!
//! Applies the blacksilk filters to BSRAW images.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod raw;

#[derive(Parser)]
#[command(name = "blacksilk")]
#[command(author, version, about = "Black and white film look processing")]
#[command(long_about = "
Applies blacksilk filters to images stored in the BSRAW container.

Examples:
  blacksilk info photo.bsraw
  blacksilk mono photo.bsraw -o bw.bsraw --red 0.3 --green 0.5 --blue 0.2
  blacksilk apply photo.bsraw -o out.bsraw -p mixer.preset -p grain.preset
  blacksilk sharpen photo.bsraw -o sharp.bsraw -r 1,2,4,8 -s 20,15,10,5
  blacksilk presets ./presets --filter FilmGrain
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Backend: auto, cpu, gpu
    #[arg(long, global = true, default_value = "cpu")]
    backend: String,

    /// Write the log to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show image information
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Run preset files as a filter stack
    Apply(ApplyArgs),

    /// Black and white conversion with channel sensitivities
    Mono(MonoArgs),

    /// Multi-scale sharpening
    Sharpen(SharpenArgs),

    /// Film grain
    Grain(GrainArgs),

    /// Radial vignette
    Vignette(VignetteArgs),

    /// List preset files
    Presets(PresetsArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Input image(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,
}

#[derive(Args)]
struct ApplyArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Preset files, applied in order
    #[arg(short, long = "preset", required = true)]
    presets: Vec<PathBuf>,
}

#[derive(Args)]
struct MonoArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Red sensitivity
    #[arg(long, default_value = "1.0")]
    red: f32,

    /// Green sensitivity
    #[arg(long, default_value = "1.0")]
    green: f32,

    /// Blue sensitivity
    #[arg(long, default_value = "1.0")]
    blue: f32,
}

#[derive(Args)]
struct SharpenArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Blur radius per cascade
    #[arg(short, long, value_delimiter = ',', default_value = "1,2,4,8")]
    radii: Vec<f32>,

    /// Strength per cascade in percent
    #[arg(short, long, value_delimiter = ',', default_value = "20,15,10,5")]
    strengths: Vec<f32>,

    /// Detail threshold
    #[arg(short, long, default_value = "0.0")]
    threshold: f32,
}

#[derive(Args)]
struct GrainArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Grain blur radius
    #[arg(short, long, default_value = "1.0")]
    radius: f32,

    /// Independent noise per channel
    #[arg(long)]
    color: bool,

    /// Noise seed
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct VignetteArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Center x in percent of the width
    #[arg(short, long, default_value = "50")]
    x: f32,

    /// Center y in percent of the height
    #[arg(short, long, default_value = "50")]
    y: f32,

    /// Radius in percent of the height
    #[arg(short, long, default_value = "100")]
    radius: f32,

    /// Strength in percent
    #[arg(short, long, default_value = "50")]
    strength: f32,
}

#[derive(Args)]
struct PresetsArgs {
    /// Directory holding .preset files
    dir: PathBuf,

    /// Only list presets for this filter
    #[arg(short, long)]
    filter: Option<String>,
}

/// Installs the tracing subscriber; the guard flushes the log file on drop.
fn init_logging(verbose: u8, log: Option<&PathBuf>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let Some(path) = log else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
    let file = path.file_name().context("Log path has no file name")?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(Some(guard))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log.as_ref())?;

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let verbose = cli.verbose > 0;
    match cli.command {
        Commands::Info(args) => commands::info::run(args, verbose),
        Commands::Apply(args) => commands::apply::run(args, &cli.backend, verbose),
        Commands::Mono(args) => commands::mono::run(args, &cli.backend, verbose),
        Commands::Sharpen(args) => commands::sharpen::run(args, &cli.backend, verbose),
        Commands::Grain(args) => commands::grain::run(args, &cli.backend, verbose),
        Commands::Vignette(args) => commands::vignette::run(args, &cli.backend, verbose),
        Commands::Presets(args) => commands::presets::run(args, verbose),
    }
}
