//! Structured error types shared across CLARITY crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of trailing characters of captured process output kept in error context.
pub const OUTPUT_TAIL_CHARS: usize = 2048;

/// Structured payload attached to every [`ClarityError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, run combinations, exit codes).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the CLARITY harness.
///
/// Families follow the propagation policy of the harness: nothing here is
/// retried internally, every variant bubbles up to the outermost caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum ClarityError {
    /// Invalid configuration or parameters, raised at construction time.
    #[error("validation error: {0}")]
    Validation(ErrorInfo),
    /// External runner failures: non-zero exit or missing artifacts.
    #[error("execution error: {0}")]
    Execution(ErrorInfo),
    /// External runner exceeded its time budget.
    #[error("timeout error: {0}")]
    Timeout(ErrorInfo),
    /// Existing output directories or in-flight cache generation.
    #[error("conflict error: {0}")]
    Conflict(ErrorInfo),
    /// Artifact content violating the data contract.
    #[error("contract error: {0}")]
    Contract(ErrorInfo),
    /// Image decoding and encoding failures.
    #[error("image error: {0}")]
    Image(ErrorInfo),
    /// Filesystem failures.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl ClarityError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            ClarityError::Validation(info)
            | ClarityError::Execution(info)
            | ClarityError::Timeout(info)
            | ClarityError::Conflict(info)
            | ClarityError::Contract(info)
            | ClarityError::Image(info)
            | ClarityError::Io(info)
            | ClarityError::Serde(info) => info,
        }
    }

    /// Adds a context entry to the payload while keeping the family intact.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            ClarityError::Validation(info) => {
                ClarityError::Validation(info.with_context(key, value))
            }
            ClarityError::Execution(info) => ClarityError::Execution(info.with_context(key, value)),
            ClarityError::Timeout(info) => ClarityError::Timeout(info.with_context(key, value)),
            ClarityError::Conflict(info) => ClarityError::Conflict(info.with_context(key, value)),
            ClarityError::Contract(info) => ClarityError::Contract(info.with_context(key, value)),
            ClarityError::Image(info) => ClarityError::Image(info.with_context(key, value)),
            ClarityError::Io(info) => ClarityError::Io(info.with_context(key, value)),
            ClarityError::Serde(info) => ClarityError::Serde(info.with_context(key, value)),
        }
    }

    /// Returns true for conflict errors (existing outputs, in-flight generation).
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClarityError::Conflict(_))
    }

    /// Returns true when the external runner timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClarityError::Timeout(_))
    }

    /// Builds a validation error with the given code and message.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        ClarityError::Validation(ErrorInfo::new(code, message))
    }

    /// Wraps an I/O failure, recording the offending path.
    pub fn io(code: impl Into<String>, path: &std::path::Path, err: impl ToString) -> Self {
        ClarityError::Io(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    }
}

/// Keeps the last [`OUTPUT_TAIL_CHARS`] characters of captured process output.
pub fn output_tail(text: &str) -> String {
    let count = text.chars().count();
    if count <= OUTPUT_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - OUTPUT_TAIL_CHARS).collect()
}
