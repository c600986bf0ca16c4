//! Canonical JSON helpers used for hashing and on-disk manifests.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ClarityError, ErrorInfo};

fn serde_error(code: &str, err: impl ToString) -> ClarityError {
    ClarityError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Recursively sorts object keys so that serialization order is independent of
/// insertion order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => {
            let canonical_values = values.into_iter().map(canonicalize).collect();
            Value::Array(canonical_values)
        }
        other => other,
    }
}

/// Serializes a value into compact canonical JSON bytes with sorted keys.
///
/// Floats are written with the shortest round-trip representation, which is
/// stable for a given `f64` bit pattern.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ClarityError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical).map_err(|err| serde_error("json_write", err))?;
    Ok(bytes)
}

/// Serializes a value as sorted-key JSON with two-space indentation and a
/// trailing newline. This is the on-disk manifest format.
pub fn to_canonical_pretty_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ClarityError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes =
        serde_json::to_vec_pretty(&canonical).map_err(|err| serde_error("json_write", err))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Serializes a value as pretty JSON keeping map insertion order.
pub fn to_ordered_pretty_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ClarityError> {
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|err| serde_error("json_write", err))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, ClarityError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}
