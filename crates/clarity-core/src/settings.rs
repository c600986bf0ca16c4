//! Process-wide runtime settings sourced once from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ClarityError, ErrorInfo};

/// Environment variable holding the runner command template.
pub const ENV_RUNNER_CMD: &str = "CLARITY_RUNNER_CMD";
/// Environment variable holding the per-run timeout in seconds.
pub const ENV_RUNNER_TIMEOUT_SECS: &str = "CLARITY_RUNNER_TIMEOUT_SECS";
/// Environment variable holding the cache root directory.
pub const ENV_CACHE_DIR: &str = "CLARITY_CACHE_DIR";
/// Environment variable holding the cache lock timeout in milliseconds.
pub const ENV_LOCK_TIMEOUT_MS: &str = "CLARITY_LOCK_TIMEOUT_MS";
/// Environment variable gating adapters that execute real models.
pub const ENV_ENABLE_REAL_MODEL: &str = "CLARITY_ENABLE_REAL_MODEL";

/// Adapter that never touches a real model and is always permitted.
pub const FAKE_ADAPTER: &str = "fake";

const DEFAULT_RUNNER_TIMEOUT_SECS: u64 = 600;
const DEFAULT_CACHE_DIR: &str = ".clarity-cache";

/// Explicit configuration passed into orchestrators instead of reading the
/// environment mid-execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Runner command template split on whitespace. Supports the `{spec}`,
    /// `{out}` and `{adapter}` placeholders.
    pub runner_command: Vec<String>,
    /// Wall-clock budget for a single runner invocation.
    pub runner_timeout: Duration,
    /// Root directory of the content-addressed cache.
    pub cache_dir: PathBuf,
    /// Maximum time spent waiting for a cache key lock before reporting a conflict.
    pub lock_timeout: Duration,
    /// Whether adapters other than [`FAKE_ADAPTER`] may be used.
    pub enable_real_model: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            runner_command: Vec::new(),
            runner_timeout: Duration::from_secs(DEFAULT_RUNNER_TIMEOUT_SECS),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            lock_timeout: Duration::ZERO,
            enable_real_model: false,
        }
    }
}

impl RuntimeSettings {
    /// Reads settings from the process environment. Call once at startup.
    pub fn from_env() -> Result<Self, ClarityError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClarityError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(raw) = lookup(ENV_RUNNER_CMD) {
            settings.runner_command = raw.split_whitespace().map(str::to_string).collect();
        }
        if let Some(raw) = lookup(ENV_RUNNER_TIMEOUT_SECS) {
            let secs = parse_u64(ENV_RUNNER_TIMEOUT_SECS, &raw)?;
            if secs == 0 {
                return Err(ClarityError::Validation(
                    ErrorInfo::new("settings.timeout_zero", "runner timeout must be positive")
                        .with_context("variable", ENV_RUNNER_TIMEOUT_SECS),
                ));
            }
            settings.runner_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(ENV_CACHE_DIR) {
            if !raw.trim().is_empty() {
                settings.cache_dir = PathBuf::from(raw.trim());
            }
        }
        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            settings.lock_timeout = Duration::from_millis(parse_u64(ENV_LOCK_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_ENABLE_REAL_MODEL) {
            settings.enable_real_model = parse_flag(ENV_ENABLE_REAL_MODEL, &raw)?;
        }
        Ok(settings)
    }

    /// Checks that `adapter` may run under these settings.
    pub fn check_adapter(&self, adapter: &str) -> Result<(), ClarityError> {
        if adapter == FAKE_ADAPTER || self.enable_real_model {
            return Ok(());
        }
        Err(ClarityError::Validation(
            ErrorInfo::new(
                "settings.real_model_disabled",
                "adapter requires real model execution",
            )
            .with_context("adapter", adapter)
            .with_hint(format!("set {ENV_ENABLE_REAL_MODEL}=1 to enable")),
        ))
    }
}

fn parse_u64(variable: &str, raw: &str) -> Result<u64, ClarityError> {
    raw.trim().parse::<u64>().map_err(|err| {
        ClarityError::Validation(
            ErrorInfo::new("settings.parse", err.to_string())
                .with_context("variable", variable)
                .with_context("value", raw),
        )
    })
}

fn parse_flag(variable: &str, raw: &str) -> Result<bool, ClarityError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClarityError::Validation(
            ErrorInfo::new("settings.flag", "expected a boolean flag")
                .with_context("variable", variable)
                .with_context("value", raw),
        )),
    }
}
