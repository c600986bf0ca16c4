//! Metrics over a completed sweep: exact-answer stability (ESI) and
//! justification drift against the first run, aggregated into a robustness
//! surface per axis value and per axis pair.

mod distance;
mod engine;
mod extract;
mod report;
mod surface;

pub use distance::{edit_distance, normalized_edit_distance};
pub use engine::{
    compute_metrics, stability, write_metrics, BaselineRef, MetricsResult, RunMetrics,
};
pub use extract::{extract_answer, extract_justification};
pub use report::{render_markdown, report_inputs, REPORT_RENDERER_VERSION};
pub use surface::{AxisSurface, PairCell, PairSurface, SurfaceCell, Summary};
