use std::collections::BTreeMap;
use std::fmt;

use clarity_core::errors::{ClarityError, ErrorInfo};
use serde_json::Value;
use tracing::debug;

use crate::ops::{Blur, Brightness, Contrast, GaussianNoise, Perturbation, Resize};
use crate::spec::Params;

/// Constructor turning validated parameters into an immutable perturbation.
pub type Constructor = fn(&Params) -> Result<Box<dyn Perturbation>, ClarityError>;

/// Registry record describing how to build a perturbation.
#[derive(Clone, Copy)]
pub struct RegistryEntry {
    /// Validating constructor.
    pub constructor: Constructor,
    /// Parameter receiving the value when a sweep axis names this perturbation.
    pub primary_parameter: &'static str,
    /// Whether the constructor requires an explicit `seed`.
    pub seeded: bool,
}

/// Name to constructor lookup.
///
/// Populated explicitly (see [`PerturbationRegistry::builtin`]); registering a
/// name twice is an error rather than a silent override.
#[derive(Clone, Default)]
pub struct PerturbationRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("primary_parameter", &self.primary_parameter)
            .field("seeded", &self.seeded)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for PerturbationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl PerturbationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in perturbation.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, RegistryEntry); 5] = [
            (
                Brightness::NAME,
                RegistryEntry {
                    constructor: |p| Ok(Box::new(Brightness::from_params(p)?)),
                    primary_parameter: "factor",
                    seeded: false,
                },
            ),
            (
                Contrast::NAME,
                RegistryEntry {
                    constructor: |p| Ok(Box::new(Contrast::from_params(p)?)),
                    primary_parameter: "factor",
                    seeded: false,
                },
            ),
            (
                GaussianNoise::NAME,
                RegistryEntry {
                    constructor: |p| Ok(Box::new(GaussianNoise::from_params(p)?)),
                    primary_parameter: "sigma",
                    seeded: true,
                },
            ),
            (
                Blur::NAME,
                RegistryEntry {
                    constructor: |p| Ok(Box::new(Blur::from_params(p)?)),
                    primary_parameter: "sigma",
                    seeded: false,
                },
            ),
            (
                Resize::NAME,
                RegistryEntry {
                    constructor: |p| Ok(Box::new(Resize::from_params(p)?)),
                    primary_parameter: "scale",
                    seeded: false,
                },
            ),
        ];
        for (name, entry) in builtins {
            registry.entries.insert(name.to_string(), entry);
        }
        registry
    }

    /// Registers a new perturbation, rejecting duplicate names.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        entry: RegistryEntry,
    ) -> Result<(), ClarityError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ClarityError::validation(
                "perturb.registry_name",
                "perturbation name must not be empty",
            ));
        }
        if self.entries.contains_key(&name) {
            return Err(ClarityError::Validation(
                ErrorInfo::new("perturb.duplicate_registration", "perturbation already registered")
                    .with_context("perturbation", name),
            ));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Looks up the registry record for `name`.
    pub fn entry(&self, name: &str) -> Result<&RegistryEntry, ClarityError> {
        self.entries.get(name).ok_or_else(|| {
            ClarityError::Validation(
                ErrorInfo::new("perturb.unknown", "unknown perturbation")
                    .with_context("perturbation", name)
                    .with_hint(format!("registered: {}", self.names().join(", "))),
            )
        })
    }

    /// Builds a perturbation from raw parameters.
    pub fn create(
        &self,
        name: &str,
        params: &Params,
    ) -> Result<Box<dyn Perturbation>, ClarityError> {
        let entry = self.entry(name)?;
        let perturbation = (entry.constructor)(params)?;
        debug!(perturbation = name, "constructed perturbation");
        Ok(perturbation)
    }

    /// Builds a perturbation from a sweep axis value.
    ///
    /// The value lands in the entry's primary parameter; seeded perturbations
    /// additionally receive `seed`.
    pub fn create_for_axis(
        &self,
        name: &str,
        value: &Value,
        seed: u64,
    ) -> Result<Box<dyn Perturbation>, ClarityError> {
        let entry = self.entry(name)?;
        let mut params = Params::new();
        params.insert(entry.primary_parameter.to_string(), value.clone());
        if entry.seeded {
            params.insert("seed".to_string(), Value::from(seed));
        }
        self.create(name, &params)
    }
}
