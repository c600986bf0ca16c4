use std::collections::BTreeMap;

use clarity_core::errors::{ClarityError, ErrorInfo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Raw perturbation parameters as they appear in configuration files.
pub type Params = BTreeMap<String, Value>;

/// Frozen description of a perturbation, serialized into run specifications.
///
/// Fields are private: a spec is only produced by a validating constructor and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationSpec {
    name: String,
    version: String,
    parameters: BTreeMap<String, Value>,
}

impl PerturbationSpec {
    pub(crate) fn new(
        name: &str,
        version: &str,
        parameters: BTreeMap<String, Value>,
    ) -> PerturbationSpec {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            parameters,
        }
    }

    /// Registered perturbation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Implementation version; bumped whenever output pixels could change.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Validated, normalised parameters.
    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    /// JSON object `{name, version, parameters}` injected into run specs.
    pub fn to_spec_dict(&self) -> Value {
        json!({
            "name": self.name,
            "version": self.version,
            "parameters": self.parameters,
        })
    }
}

pub(crate) fn invalid(perturbation: &str, key: &str, message: impl Into<String>) -> ClarityError {
    ClarityError::Validation(
        ErrorInfo::new("perturb.invalid_parameter", message)
            .with_context("perturbation", perturbation)
            .with_context("parameter", key),
    )
}

/// Rejects parameter keys the perturbation does not understand.
pub(crate) fn check_known(
    perturbation: &str,
    params: &Params,
    allowed: &[&str],
) -> Result<(), ClarityError> {
    for key in params.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(ClarityError::Validation(
                ErrorInfo::new("perturb.unknown_parameter", "unknown parameter")
                    .with_context("perturbation", perturbation)
                    .with_context("parameter", key.clone())
                    .with_hint(format!("expected one of: {}", allowed.join(", "))),
            ));
        }
    }
    Ok(())
}

pub(crate) fn require_f64(
    perturbation: &str,
    params: &Params,
    key: &str,
) -> Result<f64, ClarityError> {
    match params.get(key) {
        Some(value) => as_finite_f64(perturbation, key, value),
        None => Err(ClarityError::Validation(
            ErrorInfo::new("perturb.missing_parameter", "required parameter missing")
                .with_context("perturbation", perturbation)
                .with_context("parameter", key),
        )),
    }
}

pub(crate) fn optional_bool(
    perturbation: &str,
    params: &Params,
    key: &str,
    default: bool,
) -> Result<bool, ClarityError> {
    match params.get(key) {
        None => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(invalid(perturbation, key, "expected a boolean")),
    }
}

pub(crate) fn optional_str<'a>(
    perturbation: &str,
    params: &'a Params,
    key: &str,
) -> Result<Option<&'a str>, ClarityError> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.as_str())),
        Some(_) => Err(invalid(perturbation, key, "expected a string")),
    }
}

/// Reads the mandatory integer seed of a noise-bearing perturbation.
pub(crate) fn require_seed(perturbation: &str, params: &Params) -> Result<u64, ClarityError> {
    match params.get("seed") {
        None | Some(Value::Null) => Err(ClarityError::Validation(
            ErrorInfo::new(
                "perturb.missing_seed",
                "noise-bearing perturbation requires an explicit integer seed",
            )
            .with_context("perturbation", perturbation),
        )),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| invalid(perturbation, "seed", "seed must be a non-negative integer")),
    }
}

fn as_finite_f64(perturbation: &str, key: &str, value: &Value) -> Result<f64, ClarityError> {
    let number = value
        .as_f64()
        .ok_or_else(|| invalid(perturbation, key, "expected a number"))?;
    if !number.is_finite() {
        return Err(invalid(perturbation, key, "value must be finite"));
    }
    Ok(number)
}
