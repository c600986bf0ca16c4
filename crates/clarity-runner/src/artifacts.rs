use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clarity_core::errors::{ClarityError, ErrorInfo};
use clarity_core::hash::{sha256_hex, stable_hash_string};
use serde_json::{Map, Value};
use walkdir::WalkDir;

/// Artifact manifest file written by the runner.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Optional JSON Lines trace written by the runner.
pub const TRACE_FILE: &str = "trace.jsonl";

/// Untyped JSON object as produced by the runner.
pub type ArtifactMap = Map<String, Value>;

fn contract(code: &str, path: &Path, message: impl Into<String>) -> ClarityError {
    ClarityError::Contract(
        ErrorInfo::new(code, message).with_context("path", path.display().to_string()),
    )
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, ClarityError> {
    if !path.exists() {
        return Err(ClarityError::Execution(
            ErrorInfo::new("artifact.missing", "expected artifact was not produced")
                .with_context("path", path.display().to_string()),
        ));
    }
    fs::read(path).map_err(|err| ClarityError::io("artifact.read", path, err))
}

/// Loads a run manifest; the only check is that it is a JSON object.
pub fn load_manifest(path: &Path) -> Result<ArtifactMap, ClarityError> {
    let bytes = read_artifact(path)?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| contract("artifact.manifest_json", path, err.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(contract(
            "artifact.manifest_shape",
            path,
            "manifest must be a JSON object",
        )),
    }
}

/// Verifies that every field in `fields` is present in `map`.
pub fn require_fields(map: &ArtifactMap, fields: &[&str], path: &Path) -> Result<(), ClarityError> {
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| !map.contains_key(*field))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(ClarityError::Contract(
        ErrorInfo::new("artifact.missing_fields", "artifact is missing required fields")
            .with_context("path", path.display().to_string())
            .with_context("fields", missing.join(",")),
    ))
}

/// Loads a JSON Lines trace. Blank lines are skipped; every other line must be
/// a JSON object.
pub fn load_trace(path: &Path) -> Result<Vec<ArtifactMap>, ClarityError> {
    let bytes = read_artifact(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|err| contract("artifact.trace_utf8", path, err.to_string()))?;
    let mut steps = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let step = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(contract("artifact.trace_shape", path, "trace step must be an object")
                    .with_context("line", (idx + 1).to_string()))
            }
            Err(err) => {
                return Err(contract("artifact.trace_json", path, err.to_string())
                    .with_context("line", (idx + 1).to_string()))
            }
        };
        steps.push(step);
    }
    Ok(steps)
}

/// SHA256 of a file's bytes, or of a directory's sorted `relative path ->
/// file digest` listing.
pub fn hash_artifact(path: &Path) -> Result<String, ClarityError> {
    let metadata = fs::metadata(path).map_err(|err| {
        ClarityError::Execution(
            ErrorInfo::new("artifact.missing", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    if metadata.is_dir() {
        hash_directory(path)
    } else {
        let bytes = fs::read(path).map_err(|err| ClarityError::io("artifact.read", path, err))?;
        Ok(sha256_hex(&bytes))
    }
}

fn hash_directory(root: &Path) -> Result<String, ClarityError> {
    let mut listing = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|err| ClarityError::io("artifact.walk", root, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|err| ClarityError::io("artifact.walk", entry.path(), err))?;
        let bytes = fs::read(entry.path())
            .map_err(|err| ClarityError::io("artifact.read", entry.path(), err))?;
        listing.insert(normalise(rel), sha256_hex(&bytes));
    }
    stable_hash_string(&listing)
}

fn normalise(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_uses_forward_slashes() {
        assert_eq!(normalise(Path::new("a/b/c.json")), "a/b/c.json");
        assert_eq!(normalise(Path::new("single")), "single");
    }
}
