//! Best-effort JSON extraction from free-text model output.
//!
//! Models asked for JSON frequently wrap it in markdown fences or
//! surrounding prose. Extraction strips fences, attempts a whole-text
//! parse, then falls back to scanning for the first balanced `{...}`
//! block that parses as a JSON object.

use anyhow::Result;
use serde_json::Value;

/// Extract a JSON object embedded in otherwise unstructured text.
///
/// Returns the first parseable object found. Fails when the text contains
/// no parseable JSON object at all.
pub fn extract_json_from_text(text: &str) -> Result<Value> {
    let candidate = strip_fences(text);

    // Fast path: the whole (fence-stripped) text is the object.
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        if value.is_object() {
            return Ok(value);
        }
    }

    // Slow path: scan for balanced object candidates.
    let mut search_from = 0;
    while let Some(rel) = candidate[search_from..].find('{') {
        let start = search_from + rel;
        match balanced_object_end(candidate, start) {
            Some(end) => {
                if let Ok(value) = serde_json::from_str::<Value>(&candidate[start..end]) {
                    if value.is_object() {
                        return Ok(value);
                    }
                }
                search_from = start + 1;
            }
            None => break, // unbalanced to end of text
        }
    }

    anyhow::bail!("No JSON object found in model output")
}

/// Strip a leading markdown code fence (with optional info string) and its
/// closing fence. Text that doesn't open with a fence is returned as-is.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) up to the first newline.
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Find the exclusive end index of the balanced object opening at `start`.
/// String literals and escapes are respected so braces inside strings
/// don't affect nesting depth.
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_object() {
        let value = extract_json_from_text(r##"{"rewritten":"x","tags":["#a"],"emoji":"🔥"}"##)
            .unwrap();
        assert_eq!(value["rewritten"], "x");
        assert_eq!(value["emoji"], "🔥");
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "```json\n{\"rewritten\":\"x\",\"tags\":[\"#a\"],\"emoji\":\"🔥\"}\n```";
        let value = extract_json_from_text(text).unwrap();
        assert_eq!(value, json!({"rewritten": "x", "tags": ["#a"], "emoji": "🔥"}));
    }

    #[test]
    fn test_extract_fence_without_language() {
        let text = "```\n{\"a\": 1}\n```";
        let value = extract_json_from_text(text).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_object_wrapped_in_prose() {
        let text = "Sure! Here is your rewrite:\n{\"rewritten\": \"y\", \"tags\": [], \"emoji\": \"💪\"}\nHope that helps.";
        let value = extract_json_from_text(text).unwrap();
        assert_eq!(value["rewritten"], "y");
    }

    #[test]
    fn test_extract_fenced_json_with_prose_around() {
        let text = "Here you go:\n```json\n{\"a\": true}\n```\nLet me know!";
        let value = extract_json_from_text(text).unwrap();
        assert_eq!(value["a"], true);
    }

    #[test]
    fn test_extract_nested_object() {
        let text = "prefix {\"outer\": {\"inner\": [1, 2]}} suffix";
        let value = extract_json_from_text(text).unwrap();
        assert_eq!(value["outer"]["inner"][1], 2);
    }

    #[test]
    fn test_extract_braces_inside_strings() {
        let text = r#"note: {"rewritten": "use {curly} braces \" wisely", "tags": [], "emoji": "🧠"}"#;
        let value = extract_json_from_text(text).unwrap();
        assert_eq!(value["rewritten"], "use {curly} braces \" wisely");
    }

    #[test]
    fn test_extract_skips_unparseable_candidate() {
        // First balanced block is not valid JSON; the second is.
        let text = "{not json} then {\"ok\": 1}";
        let value = extract_json_from_text(text).unwrap();
        assert_eq!(value["ok"], 1);
    }

    #[test]
    fn test_extract_malformed_fails() {
        let err = extract_json_from_text("{\"rewritten\": ").unwrap_err();
        assert!(err.to_string().contains("No JSON object"));
    }

    #[test]
    fn test_extract_no_object_fails() {
        assert!(extract_json_from_text("I could not produce JSON, sorry.").is_err());
    }

    #[test]
    fn test_extract_array_only_fails() {
        // The contract is an object, not any JSON value.
        assert!(extract_json_from_text("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_extract_empty_input_fails() {
        assert!(extract_json_from_text("").is_err());
        assert!(extract_json_from_text("   \n  ").is_err());
    }
}
