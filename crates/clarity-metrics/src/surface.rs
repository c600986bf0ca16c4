use std::collections::BTreeMap;

use clarity_core::rounding::round8;
use clarity_sweep::encode_value;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mean metrics for one value of one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceCell {
    pub value: Value,
    pub encoded: String,
    pub runs: usize,
    pub esi: f64,
    pub drift: f64,
}

/// Cells of one axis, ordered by encoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSurface {
    pub axis: String,
    pub cells: Vec<SurfaceCell>,
}

/// Mean metrics for one value combination of an axis pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCell {
    pub first: Value,
    pub second: Value,
    pub runs: usize,
    pub esi: f64,
    pub drift: f64,
}

/// Two-axis grid; `first_axis` sorts before `second_axis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSurface {
    pub first_axis: String,
    pub second_axis: String,
    pub cells: Vec<PairCell>,
}

/// Totals across every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub runs: usize,
    pub esi: f64,
    pub drift: f64,
}

/// Unrounded per-run values feeding the aggregation.
pub(crate) struct Observation<'a> {
    pub axis_values: &'a BTreeMap<String, Value>,
    pub esi: f64,
    pub drift: f64,
}

#[derive(Default)]
struct Accumulator {
    runs: usize,
    esi_sum: f64,
    drift_sum: f64,
}

impl Accumulator {
    fn add(&mut self, observation: &Observation<'_>) {
        self.runs += 1;
        self.esi_sum += observation.esi;
        self.drift_sum += observation.drift;
    }

    fn esi(&self) -> f64 {
        round8(self.esi_sum / self.runs.max(1) as f64)
    }

    fn drift(&self) -> f64 {
        round8(self.drift_sum / self.runs.max(1) as f64)
    }
}

pub(crate) fn axis_surfaces(axes: &[String], observations: &[Observation<'_>]) -> Vec<AxisSurface> {
    axes.iter()
        .map(|axis| {
            let mut cells: BTreeMap<String, (Value, Accumulator)> = BTreeMap::new();
            for observation in observations {
                let Some(value) = observation.axis_values.get(axis) else {
                    continue;
                };
                cells
                    .entry(encode_value(value))
                    .or_insert_with(|| (value.clone(), Accumulator::default()))
                    .1
                    .add(observation);
            }
            AxisSurface {
                axis: axis.clone(),
                cells: cells
                    .into_iter()
                    .map(|(encoded, (value, acc))| SurfaceCell {
                        value,
                        encoded,
                        runs: acc.runs,
                        esi: acc.esi(),
                        drift: acc.drift(),
                    })
                    .collect(),
            }
        })
        .collect()
}

pub(crate) fn pair_surfaces(axes: &[String], observations: &[Observation<'_>]) -> Vec<PairSurface> {
    let mut surfaces = Vec::new();
    for (i, first_axis) in axes.iter().enumerate() {
        for second_axis in &axes[i + 1..] {
            let mut cells: BTreeMap<(String, String), (Value, Value, Accumulator)> =
                BTreeMap::new();
            for observation in observations {
                let (Some(first), Some(second)) = (
                    observation.axis_values.get(first_axis),
                    observation.axis_values.get(second_axis),
                ) else {
                    continue;
                };
                cells
                    .entry((encode_value(first), encode_value(second)))
                    .or_insert_with(|| (first.clone(), second.clone(), Accumulator::default()))
                    .2
                    .add(observation);
            }
            surfaces.push(PairSurface {
                first_axis: first_axis.clone(),
                second_axis: second_axis.clone(),
                cells: cells
                    .into_values()
                    .map(|(first, second, acc)| PairCell {
                        first,
                        second,
                        runs: acc.runs,
                        esi: acc.esi(),
                        drift: acc.drift(),
                    })
                    .collect(),
            });
        }
    }
    surfaces
}

pub(crate) fn summarize(observations: &[Observation<'_>]) -> Summary {
    let mut acc = Accumulator::default();
    for observation in observations {
        acc.add(observation);
    }
    Summary {
        runs: acc.runs,
        esi: acc.esi(),
        drift: acc.drift(),
    }
}
