use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::ClarityError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable SHA256 hex digest for the provided serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, ClarityError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Computes the SHA256 hex digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Returns true when `value` looks like a lowercase SHA256 hex digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
