use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clarity_core::errors::{ClarityError, ErrorInfo};
use clarity_core::rounding::round8;
use clarity_core::serde::to_canonical_pretty_bytes;
use clarity_runner::{
    hash_artifact, load_manifest, load_trace, ARTIFACT_DIR, MANIFEST_FILE, TRACE_FILE,
};
use clarity_sweep::{load_sweep_manifest, ManifestRun, SWEEP_MANIFEST_FILE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::distance::normalized_edit_distance;
use crate::extract::{extract_answer, extract_justification};
use crate::surface::{
    axis_surfaces, pair_surfaces, summarize, AxisSurface, Observation, PairSurface, Summary,
};

/// Metrics of one run relative to the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub index: usize,
    pub run_dir: String,
    pub axis_values: BTreeMap<String, Value>,
    pub seed: u64,
    pub answer: String,
    /// `1.0` when the answer matches the baseline answer, else `0.0`.
    pub esi: f64,
    /// Normalized edit distance between justifications.
    pub drift: f64,
    /// Number of steps in `trace.jsonl`, when the runner emitted one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_steps: Option<usize>,
}

/// The run every other run is compared against: always the first run of the
/// sweep manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRef {
    pub index: usize,
    pub run_dir: String,
    pub answer: String,
    pub justification: String,
}

/// Complete metrics for a sweep. Floats are rounded to eight decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub baseline: BaselineRef,
    pub per_run: Vec<RunMetrics>,
    pub surface: Vec<AxisSurface>,
    pub pairwise: Vec<PairSurface>,
    pub overall: Summary,
}

struct LoadedRun {
    dir_name: String,
    answer: String,
    justification: String,
    trace_steps: Option<usize>,
}

/// Exact-match stability of an answer against the baseline answer, ignoring
/// surrounding whitespace.
pub fn stability(answer: &str, baseline: &str) -> f64 {
    if answer.trim() == baseline.trim() {
        1.0
    } else {
        0.0
    }
}

/// Computes metrics for the sweep rooted at `sweep_root`.
pub fn compute_metrics(sweep_root: &Path) -> Result<MetricsResult, ClarityError> {
    let manifest = load_sweep_manifest(&sweep_root.join(SWEEP_MANIFEST_FILE))?;
    if manifest.runs.is_empty() {
        return Err(ClarityError::Contract(
            ErrorInfo::new("metrics.empty_sweep", "sweep manifest lists no runs")
                .with_context("root", sweep_root.display().to_string()),
        ));
    }

    let mut loaded = Vec::with_capacity(manifest.runs.len());
    for run in &manifest.runs {
        loaded.push(load_run(sweep_root, run)?);
    }
    let baseline = &loaded[0];

    let mut per_run = Vec::with_capacity(loaded.len());
    let mut raw = Vec::with_capacity(loaded.len());
    for (index, (run, data)) in manifest.runs.iter().zip(&loaded).enumerate() {
        let esi = stability(&data.answer, &baseline.answer);
        let drift = normalized_edit_distance(&data.justification, &baseline.justification);
        debug!(run = %data.dir_name, esi, drift, "run metrics");
        raw.push((esi, drift));
        per_run.push(RunMetrics {
            index,
            run_dir: data.dir_name.clone(),
            axis_values: run.axis_values.clone(),
            seed: run.seed,
            answer: data.answer.clone(),
            esi: round8(esi),
            drift: round8(drift),
            trace_steps: data.trace_steps,
        });
    }

    let observations: Vec<Observation<'_>> = manifest
        .runs
        .iter()
        .zip(&raw)
        .map(|(run, &(esi, drift))| Observation {
            axis_values: &run.axis_values,
            esi,
            drift,
        })
        .collect();
    let axes: Vec<String> = manifest.axes.keys().cloned().collect();
    let overall = summarize(&observations);
    info!(
        runs = overall.runs,
        esi = overall.esi,
        drift = overall.drift,
        baseline = %baseline.dir_name,
        "computed sweep metrics"
    );

    Ok(MetricsResult {
        baseline: BaselineRef {
            index: 0,
            run_dir: baseline.dir_name.clone(),
            answer: baseline.answer.clone(),
            justification: baseline.justification.clone(),
        },
        surface: axis_surfaces(&axes, &observations),
        pairwise: pair_surfaces(&axes, &observations),
        per_run,
        overall,
    })
}

/// Writes a metrics result as sorted-key, two-space indented JSON.
pub fn write_metrics(result: &MetricsResult, path: &Path) -> Result<(), ClarityError> {
    let bytes = to_canonical_pretty_bytes(result)?;
    fs::write(path, bytes).map_err(|err| ClarityError::io("metrics.write", path, err))
}

fn load_run(sweep_root: &Path, run: &ManifestRun) -> Result<LoadedRun, ClarityError> {
    let dir_name = run.dir_name();
    let artifact_dir = sweep_root.join(&dir_name).join(ARTIFACT_DIR);
    let manifest_path = artifact_dir.join(MANIFEST_FILE);

    let actual = hash_artifact(&manifest_path)?;
    if actual != run.manifest_hash {
        return Err(ClarityError::Contract(
            ErrorInfo::new(
                "metrics.manifest_hash_mismatch",
                "run manifest changed since the sweep recorded it",
            )
            .with_context("path", manifest_path.display().to_string())
            .with_context("expected", run.manifest_hash.clone())
            .with_context("actual", actual),
        ));
    }

    let manifest = load_manifest(&manifest_path)?;
    let answer = extract_answer(&manifest)
        .map_err(|err| err.with_context("path", manifest_path.display().to_string()))?;
    let justification = extract_justification(&manifest);

    let trace_path = artifact_dir.join(TRACE_FILE);
    let trace_steps = if trace_path.is_file() {
        Some(load_trace(&trace_path)?.len())
    } else {
        None
    };

    Ok(LoadedRun {
        dir_name,
        answer,
        justification,
        trace_steps,
    })
}
