use std::error::Error;
use std::io;

use clap::{Parser, Subcommand};
use clarity_core::RuntimeSettings;
use commands::{
    cache_status::{self, CacheStatusArgs},
    hash_image::{self, HashImageArgs},
    metrics::{self, MetricsArgs},
    perturb::{self, PerturbArgs},
    probe::{self, ProbeArgs},
    report::{self, ReportArgs},
    sweep::{self, SweepArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "clarity", version, about = "Deterministic robustness harness for multimodal models")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every combination of a sweep configuration.
    Sweep(SweepArgs),
    /// Compute stability and drift metrics for a finished sweep.
    Metrics(MetricsArgs),
    /// Mask image regions one at a time and measure the answer shift.
    Probe(ProbeArgs),
    /// Apply a single perturbation to an image.
    Perturb(PerturbArgs),
    /// Print the canonical content hash of an image.
    HashImage(HashImageArgs),
    /// Render a Markdown report for a sweep through the artifact cache.
    Report(ReportArgs),
    /// Inspect a cache key.
    CacheStatus(CacheStatusArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = RuntimeSettings::from_env()?;

    match cli.command {
        Command::Sweep(args) => sweep::run(&args, &settings),
        Command::Metrics(args) => metrics::run(&args),
        Command::Probe(args) => probe::run(&args, &settings),
        Command::Perturb(args) => perturb::run(&args),
        Command::HashImage(args) => hash_image::run(&args),
        Command::Report(args) => report::run(&args, &settings),
        Command::CacheStatus(args) => cache_status::run(&args, &settings),
    }
}
