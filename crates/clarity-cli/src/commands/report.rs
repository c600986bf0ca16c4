use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use clarity_cache::{cache_key, ArtifactCache};
use clarity_core::RuntimeSettings;
use clarity_metrics::{compute_metrics, render_markdown, report_inputs};
use tracing::info;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Sweep output root containing `sweep_manifest.json`.
    #[arg(long)]
    pub sweep: PathBuf,
    /// Write the Markdown report here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &ReportArgs, settings: &RuntimeSettings) -> Result<(), Box<dyn Error>> {
    let result = compute_metrics(&args.sweep)?;
    let key = cache_key(&report_inputs(&result))?;
    let cache = ArtifactCache::from_settings(settings);
    let outcome = cache.get_or_create(&key, || Ok(render_markdown(&result).into_bytes()))?;
    info!(key = %outcome.key, hit = outcome.hit, path = %outcome.path.display(), "report ready");
    match &args.out {
        Some(path) => fs::write(path, &outcome.bytes)?,
        None => print!("{}", String::from_utf8(outcome.bytes)?),
    }
    Ok(())
}
