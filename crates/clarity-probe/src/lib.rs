//! Counterfactual probes: mask one region of a baseline image at a time,
//! re-run the model and measure how far its answer moves.

mod engine;
mod evidence;
mod mask;
mod regions;

pub use engine::{
    ProbeEngine, ProbeMetric, ProbeSurface, RegionDelta, DEFAULT_IMAGE_FIELD, PROBE_SURFACE_FILE,
};
pub use evidence::{evidence_regions, EvidenceMap};
pub use mask::{apply_mask, MASK_FILL};
pub use regions::{grid_regions, Bounds, Region, RegionMask};
