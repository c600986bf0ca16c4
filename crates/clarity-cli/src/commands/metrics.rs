use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use clarity_metrics::{compute_metrics, write_metrics};

use super::emit_json;

#[derive(Args, Debug)]
pub struct MetricsArgs {
    /// Sweep output root containing `sweep_manifest.json`.
    #[arg(long)]
    pub sweep: PathBuf,
    /// Write metrics JSON here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &MetricsArgs) -> Result<(), Box<dyn Error>> {
    let result = compute_metrics(&args.sweep)?;
    match &args.out {
        Some(path) => write_metrics(&result, path)?,
        None => emit_json(&result, None)?,
    }
    Ok(())
}
