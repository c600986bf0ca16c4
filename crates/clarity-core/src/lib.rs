#![deny(missing_docs)]
#![doc = "Core errors, canonical serialization and determinism primitives for CLARITY."]

pub mod errors;
/// SHA256 helpers over canonical JSON and raw bytes.
pub mod hash;
pub mod rng;
/// Storage-time rounding of metric values.
pub mod rounding;
pub mod serde;
pub mod settings;

pub use errors::{output_tail, ClarityError, ErrorInfo};
pub use hash::{is_sha256_hex, sha256_hex, stable_hash_string};
pub use rng::{derive_substream_seed, RngHandle};
pub use rounding::{round8, STORED_DECIMALS};
pub use self::serde::{
    canonicalize, from_json_slice, to_canonical_json_bytes, to_canonical_pretty_bytes,
    to_ordered_pretty_bytes,
};
pub use settings::{RuntimeSettings, FAKE_ADAPTER};
