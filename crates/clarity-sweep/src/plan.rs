use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::{SweepAxis, SweepConfig};
use crate::naming::run_dir_name;

/// One combination of the sweep, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedRun {
    pub index: usize,
    pub axis_values: BTreeMap<String, Value>,
    pub seed: u64,
    pub dir_name: String,
}

/// Expands a configuration into its deterministic execution sequence.
///
/// Ordering is axes sorted by name, then each axis's values in declared order,
/// then seeds in declared order (innermost). No side effects.
pub fn plan_runs(config: &SweepConfig) -> Vec<PlannedRun> {
    let mut combinations = Vec::new();
    expand_grid(config.axes(), 0, BTreeMap::new(), &mut combinations);
    let mut runs = Vec::with_capacity(combinations.len() * config.seeds().len());
    for axis_values in combinations {
        for &seed in config.seeds() {
            let dir_name = run_dir_name(&axis_values, seed);
            runs.push(PlannedRun {
                index: runs.len(),
                axis_values: axis_values.clone(),
                seed,
                dir_name,
            });
        }
    }
    runs
}

fn expand_grid(
    axes: &[SweepAxis],
    idx: usize,
    current: BTreeMap<String, Value>,
    outputs: &mut Vec<BTreeMap<String, Value>>,
) {
    if idx == axes.len() {
        outputs.push(current);
        return;
    }
    let axis = &axes[idx];
    for value in &axis.values {
        let mut next = current.clone();
        next.insert(axis.name.clone(), value.clone());
        expand_grid(axes, idx + 1, next, outputs);
    }
}
