//! JSON recovery from model output.
//!
//! Models asked for "ONLY valid JSON" still wrap it in prose or code fences
//! often enough that every structured call goes through [`extract_json`].

use regex::Regex;
use serde_json::Value;

use blogsmith_shared::{BlogsmithError, Result};

/// Extract a JSON value from raw model text.
///
/// Tries, in order: the whole trimmed text, fenced ```json blocks, then a
/// balanced `{...}` or `[...]` scan.
pub fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(value) = extract_fenced(trimmed) {
        return Ok(value);
    }

    if let Some(value) = extract_balanced(trimmed, '{', '}') {
        return Ok(value);
    }

    if let Some(value) = extract_balanced(trimmed, '[', ']') {
        return Ok(value);
    }

    let brief: String = trimmed.chars().take(200).collect();
    Err(BlogsmithError::parse(format!(
        "could not extract JSON from response (first 200 chars: {brief})"
    )))
}

/// Typed variant of [`extract_json`].
pub fn extract_json_as<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json(text)?;
    serde_json::from_value(value)
        .map_err(|e| BlogsmithError::parse(format!("unexpected JSON shape: {e}")))
}

/// Look for a ```json (or bare ```) fenced block containing JSON.
fn extract_fenced(text: &str) -> Option<Value> {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\}|\[.*?\])\s*```").ok()?;
    for capture in fence.captures_iter(text) {
        if let Ok(value) = serde_json::from_str(capture.get(1)?.as_str()) {
            return Some(value);
        }
    }
    None
}

/// Scan for the first balanced `open`...`close` span that parses.
fn extract_balanced(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_json() {
        let value = extract_json(r#"{"title": "Hello"}"#).unwrap();
        assert_eq!(value["title"], "Hello");
    }

    #[test]
    fn parses_fenced_json() {
        let text = "Here is the outline:\n```json\n{\"sections\": [1, 2]}\n```\nDone.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["sections"][1], 2);
    }

    #[test]
    fn parses_embedded_object() {
        let text = "Sure! The result is {\"score\": 0.9, \"notes\": []} as requested.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["score"], 0.9);
    }

    #[test]
    fn parses_embedded_array() {
        let text = "Ranking: [2, 0, 1] (most relevant first)";
        let value = extract_json(text).unwrap();
        assert_eq!(value, serde_json::json!([2, 0, 1]));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scan() {
        let text = r#"prefix {"body": "uses { and } freely", "n": 1} suffix"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn rejects_text_without_json() {
        let err = extract_json("no structured data here").unwrap_err();
        assert!(matches!(err, BlogsmithError::Parse { .. }));
    }

    #[test]
    fn typed_extraction() {
        #[derive(serde::Deserialize)]
        struct Ranked {
            order: Vec<usize>,
        }
        let ranked: Ranked =
            extract_json_as("```json\n{\"order\": [1, 0]}\n```").unwrap();
        assert_eq!(ranked.order, vec![1, 0]);
    }
}
