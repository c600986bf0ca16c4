use std::error::Error;
use std::fs;
use std::path::Path;

use clarity_core::to_canonical_pretty_bytes;
use serde::Serialize;

pub mod cache_status;
pub mod hash_image;
pub mod metrics;
pub mod perturb;
pub mod probe;
pub mod report;
pub mod sweep;

/// Writes `value` as canonical JSON to `out`, or to stdout when `out` is `None`.
pub(crate) fn emit_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let bytes = to_canonical_pretty_bytes(value)?;
    match out {
        Some(path) => fs::write(path, bytes)?,
        None => print!("{}", String::from_utf8(bytes)?),
    }
    Ok(())
}
