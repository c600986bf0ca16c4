//! Content-addressed byte cache.
//!
//! Entries live at `<root>/<sha256>`. Generation of a missing entry is guarded
//! by an advisory lock at `<root>/.locks/<sha256>.lock`; a second generator
//! for the same key receives a conflict instead of waiting indefinitely.

mod lock;
mod store;

pub use store::{cache_key, ArtifactCache, CacheEntry, CacheOutcome, LOCK_DIR};
