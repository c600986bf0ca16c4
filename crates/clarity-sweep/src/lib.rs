//! Sweep orchestration: expands axes x values x seeds into an ordered run
//! sequence, injects perturbation descriptions into an opaque base spec and
//! invokes the runner once per combination.

mod config;
mod manifest;
mod naming;
mod orchestrator;
mod plan;

pub use config::{SweepAxis, SweepConfig};
pub use manifest::{load_sweep_manifest, ManifestRun, SweepManifest, SWEEP_MANIFEST_FILE};
pub use naming::{encode_value, run_dir_name};
pub use orchestrator::{SweepOrchestrator, SweepResult, SweepRunRecord, SPEC_FILE};
pub use plan::{plan_runs, PlannedRun};
