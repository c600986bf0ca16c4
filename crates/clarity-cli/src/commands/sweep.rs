use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use clarity_core::RuntimeSettings;
use clarity_perturb::PerturbationRegistry;
use clarity_runner::SubprocessRunner;
use clarity_sweep::{plan_runs, SweepConfig, SweepOrchestrator};
use tracing::info;

use super::emit_json;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// YAML or JSON sweep configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Output root; must not exist yet.
    #[arg(long, required_unless_present = "dry_run")]
    pub out: Option<PathBuf>,
    /// Print the planned runs without invoking the runner.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: &SweepArgs, settings: &RuntimeSettings) -> Result<(), Box<dyn Error>> {
    let registry = PerturbationRegistry::builtin();
    let config = SweepConfig::from_yaml_path(&args.config, &registry)?;
    if args.dry_run {
        return emit_json(&plan_runs(&config), None);
    }
    let Some(out) = args.out.as_deref() else {
        return Err("--out is required unless --dry-run is set".into());
    };

    let runner = SubprocessRunner::from_settings(settings, config.adapter())?;
    let orchestrator = SweepOrchestrator::new(config, registry, runner, settings)?;
    let result = orchestrator.run(out)?;
    info!(runs = result.runs.len(), "sweep finished");
    println!("{}", result.manifest_path.display());
    Ok(())
}
