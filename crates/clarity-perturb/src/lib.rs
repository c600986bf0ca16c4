//! Deterministic perturbation primitives over a canonical RGB representation.

mod canonical;
mod ops;
mod registry;
mod spec;

pub use canonical::{image_hash, CanonicalImage};
pub use ops::{Blur, Brightness, Contrast, GaussianNoise, Perturbation, Resize};
pub use registry::{Constructor, PerturbationRegistry, RegistryEntry};
pub use spec::{Params, PerturbationSpec};
