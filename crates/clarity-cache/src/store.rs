use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clarity_core::errors::{ClarityError, ErrorInfo};
use clarity_core::hash::{is_sha256_hex, stable_hash_string};
use clarity_core::settings::RuntimeSettings;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::lock::{acquire, is_held};

/// Directory under the cache root holding per-key lock files.
pub const LOCK_DIR: &str = ".locks";

/// Key for a set of generation inputs: SHA-256 of their canonical JSON.
pub fn cache_key<T: Serialize>(inputs: &T) -> Result<String, ClarityError> {
    stable_hash_string(inputs)
}

/// Bytes returned by [`ArtifactCache::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOutcome {
    pub key: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// `true` when the generator was skipped.
    pub hit: bool,
}

/// Snapshot of a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub path: PathBuf,
    pub exists: bool,
    pub generation_in_progress: bool,
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    lock_timeout: Duration,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            lock_timeout,
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.cache_dir.clone(), settings.lock_timeout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, ClarityError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.root.join(LOCK_DIR).join(format!("{key}.lock"))
    }

    /// Returns the cached bytes for `key`, running `generate` only on a miss.
    ///
    /// While generating, the key's lock is held; a concurrent caller for the
    /// same key that cannot take the lock within the configured timeout gets
    /// [`ClarityError::Conflict`]. The entry is written to a temporary file in
    /// the cache root and renamed into place, so readers never see a partial
    /// file.
    pub fn get_or_create<F>(&self, key: &str, generate: F) -> Result<CacheOutcome, ClarityError>
    where
        F: FnOnce() -> Result<Vec<u8>, ClarityError>,
    {
        let path = self.path_for(key)?;
        if let Some(bytes) = read_entry(&path)? {
            debug!(key, "cache hit");
            return Ok(CacheOutcome {
                key: key.to_string(),
                path,
                bytes,
                hit: true,
            });
        }

        let lock_dir = self.root.join(LOCK_DIR);
        fs::create_dir_all(&lock_dir)
            .map_err(|err| ClarityError::io("cache.create_dir", &lock_dir, err))?;
        let _lock = acquire(&self.lock_path(key), key, self.lock_timeout)?;

        // Another process may have finished while we waited for the lock.
        if let Some(bytes) = read_entry(&path)? {
            debug!(key, "cache hit after lock");
            return Ok(CacheOutcome {
                key: key.to_string(),
                path,
                bytes,
                hit: true,
            });
        }

        debug!(key, "cache miss; generating");
        let bytes = generate().map_err(|err| err.with_context("key", key))?;
        self.write_atomic(&path, &bytes)?;
        Ok(CacheOutcome {
            key: key.to_string(),
            path,
            bytes,
            hit: false,
        })
    }

    pub fn entry(&self, key: &str) -> Result<CacheEntry, ClarityError> {
        let path = self.path_for(key)?;
        Ok(CacheEntry {
            key: key.to_string(),
            exists: path.is_file(),
            generation_in_progress: is_held(&self.lock_path(key))?,
            path,
        })
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), ClarityError> {
        let mut tmp = NamedTempFile::new_in(&self.root)
            .map_err(|err| ClarityError::io("cache.temp_create", &self.root, err))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|err| ClarityError::io("cache.temp_write", tmp.path(), err))?;
        tmp.persist(path)
            .map_err(|err| ClarityError::io("cache.persist", path, err.error))?;
        Ok(())
    }
}

fn check_key(key: &str) -> Result<(), ClarityError> {
    if is_sha256_hex(key) {
        return Ok(());
    }
    Err(ClarityError::Validation(
        ErrorInfo::new("cache.invalid_key", "cache key must be a lowercase sha256 hex digest")
            .with_context("key", key),
    ))
}

fn read_entry(path: &Path) -> Result<Option<Vec<u8>>, ClarityError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ClarityError::io("cache.read", path, err)),
    }
}
