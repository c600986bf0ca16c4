use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clarity_core::errors::ClarityError;
use clarity_core::serde::{from_json_slice, to_canonical_pretty_bytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::naming::run_dir_name;

/// File name of the sweep manifest inside the output root.
pub const SWEEP_MANIFEST_FILE: &str = "sweep_manifest.json";

/// Manifest entry for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRun {
    pub axis_values: BTreeMap<String, Value>,
    pub seed: u64,
    pub manifest_hash: String,
}

impl ManifestRun {
    /// Directory name of this run under the sweep root.
    pub fn dir_name(&self) -> String {
        run_dir_name(&self.axis_values, self.seed)
    }
}

/// On-disk summary of a completed sweep.
///
/// Serialized with sorted keys and two-space indentation so that identical
/// sweeps produce byte-identical files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepManifest {
    pub axes: BTreeMap<String, Vec<Value>>,
    pub seeds: Vec<u64>,
    pub runs: Vec<ManifestRun>,
}

impl SweepManifest {
    /// Canonical byte representation written to disk.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClarityError> {
        to_canonical_pretty_bytes(self)
    }
}

/// Reads a sweep manifest written by [`crate::SweepOrchestrator`].
pub fn load_sweep_manifest(path: &Path) -> Result<SweepManifest, ClarityError> {
    let bytes = fs::read(path).map_err(|err| ClarityError::io("sweep.manifest_read", path, err))?;
    from_json_slice(&bytes).map_err(|err| err.with_context("path", path.display().to_string()))
}
