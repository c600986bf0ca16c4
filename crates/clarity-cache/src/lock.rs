use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use clarity_core::errors::{ClarityError, ErrorInfo};
use fs4::fs_std::FileExt;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive advisory lock on a key's lock file, released on drop.
#[derive(Debug)]
pub(crate) struct KeyLock {
    file: File,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File, ClarityError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|err| ClarityError::io("cache.lock_open", path, err))
}

/// Polls for the lock until `timeout` elapses. A zero timeout makes exactly
/// one attempt.
pub(crate) fn acquire(path: &Path, key: &str, timeout: Duration) -> Result<KeyLock, ClarityError> {
    let file = open_lock_file(path)?;
    poll_lock(|| FileExt::try_lock_exclusive(&file), path, key, timeout)?;
    Ok(KeyLock { file })
}

/// Retries `attempt` while it reports contention. An I/O error ends the wait at once.
fn poll_lock(
    mut attempt: impl FnMut() -> io::Result<bool>,
    path: &Path,
    key: &str,
    timeout: Duration,
) -> Result<(), ClarityError> {
    let started = Instant::now();
    loop {
        match attempt() {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => {
                return Err(ClarityError::io("cache.lock", path, err).with_context("key", key))
            }
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(ClarityError::Conflict(
                ErrorInfo::new(
                    "cache.generation_in_progress",
                    "another generator holds the lock for this key",
                )
                .with_context("key", key)
                .with_context("lock", path.display().to_string())
                .with_context("waited_ms", elapsed.as_millis().to_string())
                .with_hint("retry once the in-flight generation finishes"),
            ));
        }
        debug!(key, "waiting for cache lock");
        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

/// Reports whether some other handle currently holds the lock at `path`.
pub(crate) fn is_held(path: &Path) -> Result<bool, ClarityError> {
    if !path.is_file() {
        return Ok(false);
    }
    let file = open_lock_file(path)?;
    match FileExt::try_lock_exclusive(&file) {
        Ok(true) => {
            let _ = FileExt::unlock(&file);
            Ok(false)
        }
        Ok(false) => Ok(true),
        Err(err) => Err(ClarityError::io("cache.lock_probe", path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_error_is_reported_as_io_without_waiting() {
        let mut calls = 0;
        let started = Instant::now();
        let err = poll_lock(
            || {
                calls += 1;
                Err(io::Error::new(io::ErrorKind::Other, "no locks available"))
            },
            Path::new("/cache/.locks/k.lock"),
            "k",
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(err, ClarityError::Io(_)));
        assert!(!err.is_conflict());
        assert_eq!(err.info().code, "cache.lock");
        assert_eq!(err.info().context["key"], "k");
    }

    #[test]
    fn contention_becomes_conflict_after_timeout() {
        let mut calls = 0;
        let err = poll_lock(
            || {
                calls += 1;
                Ok(false)
            },
            Path::new("k.lock"),
            "k",
            Duration::from_millis(120),
        )
        .unwrap_err();
        assert!(calls >= 2);
        assert!(err.is_conflict());
        assert_eq!(err.info().code, "cache.generation_in_progress");
    }

    #[test]
    fn later_success_acquires() {
        let mut calls = 0;
        poll_lock(
            || {
                calls += 1;
                Ok(calls == 3)
            },
            Path::new("k.lock"),
            "k",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(calls, 3);
    }
}
