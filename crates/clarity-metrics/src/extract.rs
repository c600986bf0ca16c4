use clarity_core::errors::{ClarityError, ErrorInfo};
use clarity_runner::ArtifactMap;
use serde_json::Value;

fn text_of(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Model answer: `output`, falling back to `answer` when `output` is absent
/// or empty. Missing both is a contract violation.
pub fn extract_answer(manifest: &ArtifactMap) -> Result<String, ClarityError> {
    let output = text_of(manifest.get("output"));
    if let Some(text) = &output {
        if !text.trim().is_empty() {
            return Ok(text.clone());
        }
    }
    match (text_of(manifest.get("answer")), output) {
        (Some(answer), _) => Ok(answer),
        (None, Some(empty_output)) => Ok(empty_output),
        (None, None) => Err(ClarityError::Contract(
            ErrorInfo::new(
                "metrics.missing_answer",
                "run manifest has neither `output` nor `answer`",
            )
            .with_hint("the runner must emit the model answer in `output` or `answer`"),
        )),
    }
}

/// Justification text, or the empty string when absent. Never falls back to
/// the answer.
pub fn extract_justification(manifest: &ArtifactMap) -> String {
    text_of(manifest.get("justification")).unwrap_or_default()
}
