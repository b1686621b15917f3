//! Tolerant parsing of structured JSON out of model replies.
//!
//! Models asked for JSON frequently wrap it in a Markdown code fence or lead
//! with a sentence of prose. One utility handles the cleanup so every caller
//! degrades the same way: parse as-is, then retry the first fenced block,
//! then surface the decode error.

use serde_json::Value;

/// Parse a model reply as JSON, stripping a code fence if present.
pub fn extract_json(text: &str) -> Result<Value, serde_json::Error> {
    let trimmed = text.trim();
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(err) => match fenced_block(trimmed) {
            Some(inner) => serde_json::from_str(inner.trim()),
            None => Err(err),
        },
    }
}

/// Contents of the first ``` fence, with an optional `json` language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```")?;
    Some(&after[..end])
}

/// Read a numeric field, accepting numbers or numeric strings.
pub fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a boolean field, accepting booleans or "true"/"false" strings.
pub fn bool_field(value: &Value, key: &str) -> Option<bool> {
    match value.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Read a string field.
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_plain_json() {
        let value = extract_json(r#"{"relevance_score": 8.5}"#).unwrap();
        assert_eq!(value["relevance_score"], 8.5);
    }

    #[test]
    fn test_fenced_json_with_language_tag() {
        let text = "```json\n{\"is_relevant\": true}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["is_relevant"], true);
    }

    #[test]
    fn test_fenced_json_without_language_tag() {
        let text = "```\n{\"tldr\": \"short\"}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["tldr"], "short");
    }

    #[test]
    fn test_prose_around_fence() {
        let text = "Here is the assessment you asked for:\n```json\n{\"score\": 3}\n```\nLet me know!";
        let value = extract_json(text).unwrap();
        assert_eq!(value["score"], 3);
    }

    #[test]
    fn test_garbage_fails() {
        assert!(extract_json("not json at all").is_err());
    }

    #[test]
    fn test_unclosed_fence_fails() {
        assert!(extract_json("```json\n{\"a\": 1}").is_err());
    }

    #[test]
    fn test_number_field_accepts_strings() {
        let value = json!({ "score": "7.5", "other": 3, "bad": "x" });
        assert_eq!(number_field(&value, "score"), Some(7.5));
        assert_eq!(number_field(&value, "other"), Some(3.0));
        assert_eq!(number_field(&value, "bad"), None);
        assert_eq!(number_field(&value, "missing"), None);
    }

    #[test]
    fn test_bool_field_accepts_strings() {
        let value = json!({ "a": true, "b": "False", "c": "yes" });
        assert_eq!(bool_field(&value, "a"), Some(true));
        assert_eq!(bool_field(&value, "b"), Some(false));
        assert_eq!(bool_field(&value, "c"), None);
        assert_eq!(bool_field(&value, "missing"), None);
    }

    #[test]
    fn test_string_field() {
        let value = json!({ "reasoning": "on topic", "n": 4 });
        assert_eq!(string_field(&value, "reasoning"), Some("on topic".to_string()));
        assert_eq!(string_field(&value, "n"), None);
    }
}
