use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use clarity_core::errors::{ClarityError, ErrorInfo};
use clarity_core::settings::FAKE_ADAPTER;
use clarity_perturb::PerturbationRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::naming::encode_value;

/// One perturbation axis: a registered perturbation name and the values its
/// primary parameter takes, in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepAxis {
    pub name: String,
    pub values: Vec<Value>,
}

impl SweepAxis {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Validated sweep configuration. Axes are held sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    base_spec_path: PathBuf,
    axes: Vec<SweepAxis>,
    seeds: Vec<u64>,
    adapter: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSweepConfig {
    base_spec_path: PathBuf,
    axes: Vec<SweepAxis>,
    seeds: Vec<u64>,
    #[serde(default = "default_adapter")]
    adapter: String,
}

fn default_adapter() -> String {
    FAKE_ADAPTER.to_string()
}

impl SweepConfig {
    /// Validates every invariant up front; nothing is deferred to execution.
    pub fn new(
        base_spec_path: impl Into<PathBuf>,
        axes: Vec<SweepAxis>,
        seeds: Vec<u64>,
        adapter: impl Into<String>,
        registry: &PerturbationRegistry,
    ) -> Result<Self, ClarityError> {
        let base_spec_path = base_spec_path.into();
        if base_spec_path.as_os_str().is_empty() {
            return Err(ClarityError::validation(
                "sweep.base_spec_missing",
                "base spec path must not be empty",
            ));
        }
        let adapter = adapter.into();
        if adapter.trim().is_empty() {
            return Err(ClarityError::validation(
                "sweep.adapter_missing",
                "adapter name must not be empty",
            ));
        }
        validate_seeds(&seeds)?;
        if axes.is_empty() {
            return Err(ClarityError::validation(
                "sweep.no_axes",
                "a sweep needs at least one axis",
            ));
        }
        let probe_seed = seeds[0];
        let mut names = BTreeSet::new();
        for axis in &axes {
            if axis.name.trim().is_empty() {
                return Err(ClarityError::validation(
                    "sweep.axis_name",
                    "axis name must not be empty",
                ));
            }
            if !names.insert(axis.name.as_str()) {
                return Err(ClarityError::Validation(
                    ErrorInfo::new("sweep.duplicate_axis", "axis names must be unique")
                        .with_context("axis", axis.name.clone()),
                ));
            }
            validate_axis(axis, probe_seed, registry)?;
        }

        let mut axes = axes;
        axes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            base_spec_path,
            axes,
            seeds,
            adapter,
        })
    }

    /// Parses a YAML (or JSON) document. A relative `base_spec_path` is
    /// resolved against `base_dir`.
    pub fn from_yaml_slice(
        bytes: &[u8],
        base_dir: &Path,
        registry: &PerturbationRegistry,
    ) -> Result<Self, ClarityError> {
        let raw: RawSweepConfig = serde_yaml::from_slice(bytes).map_err(|err| {
            ClarityError::Validation(ErrorInfo::new("sweep.config_parse", err.to_string()))
        })?;
        let base_spec_path = if raw.base_spec_path.is_relative() {
            base_dir.join(&raw.base_spec_path)
        } else {
            raw.base_spec_path
        };
        Self::new(base_spec_path, raw.axes, raw.seeds, raw.adapter, registry)
    }

    /// Loads a configuration file from disk.
    pub fn from_yaml_path(path: &Path, registry: &PerturbationRegistry) -> Result<Self, ClarityError> {
        let bytes = fs::read(path).map_err(|err| ClarityError::io("sweep.config_read", path, err))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_slice(&bytes, base_dir, registry)
            .map_err(|err| err.with_context("config", path.display().to_string()))
    }

    pub fn base_spec_path(&self) -> &Path {
        &self.base_spec_path
    }

    /// Axes sorted by name.
    pub fn axes(&self) -> &[SweepAxis] {
        &self.axes
    }

    /// Seeds in declared order.
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// Number of runs the sweep expands to.
    pub fn run_count(&self) -> usize {
        self.axes
            .iter()
            .map(|axis| axis.values.len())
            .product::<usize>()
            * self.seeds.len()
    }
}

fn validate_seeds(seeds: &[u64]) -> Result<(), ClarityError> {
    if seeds.is_empty() {
        return Err(ClarityError::validation(
            "sweep.no_seeds",
            "a sweep needs at least one seed",
        ));
    }
    let mut seen = BTreeSet::new();
    for seed in seeds {
        if !seen.insert(*seed) {
            return Err(ClarityError::Validation(
                ErrorInfo::new("sweep.duplicate_seed", "seeds must be unique")
                    .with_context("seed", seed.to_string()),
            ));
        }
    }
    Ok(())
}

fn validate_axis(
    axis: &SweepAxis,
    probe_seed: u64,
    registry: &PerturbationRegistry,
) -> Result<(), ClarityError> {
    if axis.values.is_empty() {
        return Err(ClarityError::Validation(
            ErrorInfo::new("sweep.empty_axis", "axis must declare at least one value")
                .with_context("axis", axis.name.clone()),
        ));
    }
    let mut encodings: BTreeMap<String, &Value> = BTreeMap::new();
    for value in &axis.values {
        if !matches!(value, Value::Number(_) | Value::String(_) | Value::Bool(_)) {
            return Err(ClarityError::Validation(
                ErrorInfo::new("sweep.axis_value_type", "axis values must be scalars")
                    .with_context("axis", axis.name.clone())
                    .with_context("value", value.to_string()),
            ));
        }
        let encoded = encode_value(value);
        if encoded.is_empty() {
            return Err(ClarityError::Validation(
                ErrorInfo::new("sweep.axis_value_encoding", "value encodes to an empty token")
                    .with_context("axis", axis.name.clone())
                    .with_context("value", value.to_string()),
            ));
        }
        if let Some(previous) = encodings.insert(encoded.clone(), value) {
            return Err(ClarityError::Validation(
                ErrorInfo::new("sweep.encoding_collision", "values share a directory encoding")
                    .with_context("axis", axis.name.clone())
                    .with_context("value", value.to_string())
                    .with_context("previous", previous.to_string())
                    .with_context("encoding", encoded),
            ));
        }
        registry
            .create_for_axis(&axis.name, value, probe_seed)
            .map_err(|err| err.with_context("axis", axis.name.clone()))?;
    }
    Ok(())
}
