use std::error::Error;

use clap::Args;
use clarity_cache::ArtifactCache;
use clarity_core::RuntimeSettings;

use super::emit_json;

#[derive(Args, Debug)]
pub struct CacheStatusArgs {
    /// SHA-256 cache key.
    pub key: String,
}

pub fn run(args: &CacheStatusArgs, settings: &RuntimeSettings) -> Result<(), Box<dyn Error>> {
    let entry = ArtifactCache::from_settings(settings).entry(&args.key)?;
    emit_json(&entry, None)
}
