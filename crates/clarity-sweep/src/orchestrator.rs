use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clarity_core::errors::{ClarityError, ErrorInfo};
use clarity_core::serde::to_ordered_pretty_bytes;
use clarity_core::settings::RuntimeSettings;
use clarity_perturb::PerturbationRegistry;
use clarity_runner::{hash_artifact, write_stream_logs, Runner, ARTIFACT_DIR, MANIFEST_FILE};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::SweepConfig;
use crate::manifest::{ManifestRun, SweepManifest, SWEEP_MANIFEST_FILE};
use crate::plan::{plan_runs, PlannedRun};

/// Name of the per-run specification written before the runner is invoked.
pub const SPEC_FILE: &str = "spec.json";

/// Immutable result of one executed combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRunRecord {
    pub axis_values: BTreeMap<String, Value>,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub manifest_hash: String,
}

/// Outcome of a completed sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub runs: Vec<SweepRunRecord>,
    pub manifest_path: PathBuf,
}

/// Executes a [`SweepConfig`] sequentially against a [`Runner`].
pub struct SweepOrchestrator<R> {
    config: SweepConfig,
    registry: PerturbationRegistry,
    runner: R,
    timeout: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl<R: Runner> SweepOrchestrator<R> {
    /// Binds a configuration to a runner. The adapter is checked against the
    /// real-model gate here rather than mid-sweep.
    pub fn new(
        config: SweepConfig,
        registry: PerturbationRegistry,
        runner: R,
        settings: &RuntimeSettings,
    ) -> Result<Self, ClarityError> {
        settings.check_adapter(config.adapter())?;
        Ok(Self {
            config,
            registry,
            runner,
            timeout: settings.runner_timeout,
            cancel: None,
        })
    }

    /// Installs a flag that, once set, stops the sweep before the next run.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Runs every combination under `output_root`, which must not exist yet.
    ///
    /// Run directories already written stay in place when a later run fails.
    pub fn run(&self, output_root: &Path) -> Result<SweepResult, ClarityError> {
        if output_root.exists() {
            return Err(output_conflict("sweep.output_exists", output_root));
        }
        let base_spec = self.load_base_spec()?;
        let plan = plan_runs(&self.config);

        if let Some(parent) = output_root.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| ClarityError::io("sweep.output_parent", parent, err))?;
            }
        }
        create_exclusive_dir(output_root, "sweep.output_exists")?;
        info!(
            root = %output_root.display(),
            runs = plan.len(),
            adapter = self.config.adapter(),
            "starting sweep"
        );

        let mut runs = Vec::with_capacity(plan.len());
        for planned in &plan {
            if self.cancelled() {
                warn!(completed = runs.len(), total = plan.len(), "sweep cancelled");
                return Err(ClarityError::Execution(
                    ErrorInfo::new("sweep.cancelled", "sweep cancelled before completion")
                        .with_context("completed", runs.len().to_string())
                        .with_context("next", planned.dir_name.clone()),
                ));
            }
            let record = self.execute(planned, &base_spec, output_root).map_err(|err| {
                warn!(
                    combination = %planned.dir_name,
                    completed = runs.len(),
                    "sweep run failed; earlier runs are left in place"
                );
                err.with_context("combination", planned.dir_name.clone())
                    .with_context("run_index", planned.index.to_string())
            })?;
            info!(
                index = planned.index,
                total = plan.len(),
                combination = %planned.dir_name,
                manifest_hash = %record.manifest_hash,
                "run complete"
            );
            runs.push(record);
        }

        let manifest = SweepManifest {
            axes: self
                .config
                .axes()
                .iter()
                .map(|axis| (axis.name.clone(), axis.values.clone()))
                .collect(),
            seeds: self.config.seeds().to_vec(),
            runs: runs
                .iter()
                .map(|run| ManifestRun {
                    axis_values: run.axis_values.clone(),
                    seed: run.seed,
                    manifest_hash: run.manifest_hash.clone(),
                })
                .collect(),
        };
        let manifest_path = output_root.join(SWEEP_MANIFEST_FILE);
        fs::write(&manifest_path, manifest.to_bytes()?)
            .map_err(|err| ClarityError::io("sweep.manifest_write", &manifest_path, err))?;
        info!(manifest = %manifest_path.display(), "sweep complete");

        Ok(SweepResult {
            runs,
            manifest_path,
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    fn load_base_spec(&self) -> Result<Map<String, Value>, ClarityError> {
        let path = self.config.base_spec_path();
        let bytes = fs::read(path).map_err(|err| ClarityError::io("sweep.base_spec_read", path, err))?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ClarityError::Validation(
                ErrorInfo::new("sweep.base_spec_shape", "base spec must be a JSON object")
                    .with_context("path", path.display().to_string()),
            )),
            Err(err) => Err(ClarityError::Validation(
                ErrorInfo::new("sweep.base_spec_json", err.to_string())
                    .with_context("path", path.display().to_string()),
            )),
        }
    }

    fn build_spec(
        &self,
        planned: &PlannedRun,
        base_spec: &Map<String, Value>,
    ) -> Result<Value, ClarityError> {
        let mut perturbations = Vec::with_capacity(planned.axis_values.len());
        for (name, value) in &planned.axis_values {
            let perturbation = self.registry.create_for_axis(name, value, planned.seed)?;
            perturbations.push(perturbation.to_spec_dict());
        }
        let mut spec = base_spec.clone();
        spec.insert("perturbations".to_string(), Value::Array(perturbations));
        spec.insert("seed".to_string(), Value::from(planned.seed));
        Ok(Value::Object(spec))
    }

    fn execute(
        &self,
        planned: &PlannedRun,
        base_spec: &Map<String, Value>,
        output_root: &Path,
    ) -> Result<SweepRunRecord, ClarityError> {
        let run_dir = output_root.join(&planned.dir_name);
        create_exclusive_dir(&run_dir, "sweep.run_dir_exists")?;

        let spec = self.build_spec(planned, base_spec)?;
        let spec_path = run_dir.join(SPEC_FILE);
        fs::write(&spec_path, to_ordered_pretty_bytes(&spec)?)
            .map_err(|err| ClarityError::io("sweep.spec_write", &spec_path, err))?;

        let result = self.runner.invoke(&spec_path, self.timeout)?;
        write_stream_logs(&run_dir, &result.stdout, &result.stderr)?;

        let expected_dir = run_dir.join(ARTIFACT_DIR);
        if result.artifact_dir != expected_dir {
            return Err(ClarityError::Contract(
                ErrorInfo::new(
                    "sweep.artifact_dir",
                    "runner must write artifacts inside the run directory",
                )
                .with_context("artifact_dir", result.artifact_dir.display().to_string())
                .with_context("expected", expected_dir.display().to_string()),
            ));
        }
        let manifest_path = expected_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ClarityError::Execution(
                ErrorInfo::new("sweep.missing_manifest", "runner produced no artifact manifest")
                    .with_context("path", manifest_path.display().to_string())
                    .with_context("exit_code", result.exit_code.to_string()),
            ));
        }
        let manifest_hash = hash_artifact(&manifest_path)?;

        Ok(SweepRunRecord {
            axis_values: planned.axis_values.clone(),
            seed: planned.seed,
            output_dir: run_dir,
            manifest_hash,
        })
    }
}

fn output_conflict(code: &str, path: &Path) -> ClarityError {
    ClarityError::Conflict(
        ErrorInfo::new(code, "output directory already exists")
            .with_context("path", path.display().to_string())
            .with_hint("choose a fresh output directory; sweeps never overwrite"),
    )
}

fn create_exclusive_dir(path: &Path, conflict_code: &str) -> Result<(), ClarityError> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            Err(output_conflict(conflict_code, path))
        }
        Err(err) => Err(ClarityError::io("sweep.create_dir", path, err)),
    }
}
