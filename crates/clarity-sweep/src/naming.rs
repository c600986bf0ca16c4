use std::collections::BTreeMap;

use serde_json::Value;

const SEGMENT_SEPARATOR: &str = "__";

/// Encodes a scalar axis value into a filesystem-safe token.
///
/// `.` becomes `p`, `-` becomes `m`, and anything outside `[A-Za-z0-9_=]` is
/// dropped. Metrics aggregation sorts on this same token.
pub fn encode_value(value: &Value) -> String {
    let raw = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    sanitize(&raw)
}

/// Directory name for one combination: axis segments in sorted-name order
/// followed by the seed, e.g. `brightness=0p8__contrast=1p0__seed=1`.
pub fn run_dir_name(axis_values: &BTreeMap<String, Value>, seed: u64) -> String {
    let mut segments: Vec<String> = axis_values
        .iter()
        .map(|(name, value)| format!("{}={}", sanitize(name), encode_value(value)))
        .collect();
    segments.push(format!("seed={seed}"));
    segments.join(SEGMENT_SEPARATOR)
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '.' => Some('p'),
            '-' => Some('m'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '=' => Some(c),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_keep_their_json_spelling() {
        assert_eq!(encode_value(&json!(0.8)), "0p8");
        assert_eq!(encode_value(&json!(1.0)), "1p0");
        assert_eq!(encode_value(&json!(-0.25)), "m0p25");
        assert_eq!(encode_value(&json!(3)), "3");
    }

    #[test]
    fn strings_lose_disallowed_characters() {
        assert_eq!(encode_value(&json!("catmull rom/v2")), "catmullromv2");
        assert_eq!(encode_value(&json!(true)), "true");
    }

    #[test]
    fn dir_name_joins_sorted_segments() {
        let mut values = BTreeMap::new();
        values.insert("contrast".to_string(), json!(1.0));
        values.insert("brightness".to_string(), json!(0.8));
        assert_eq!(
            run_dir_name(&values, 1),
            "brightness=0p8__contrast=1p0__seed=1"
        );
    }
}
