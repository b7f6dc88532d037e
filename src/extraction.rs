//! Recovers a JSON value from free-form generator text.
//!
//! Generators wrap JSON in prose and code fences. After removing fence markers the
//! text is scanned for top-level candidates: each starts at an opening `{` or `[`
//! and ends at its balancing closer (string and escape aware), or at the end of the
//! text if it never closes. The first candidate that parses is returned.
//!
//! "Nothing that looks like JSON" and "JSON-looking text that does not parse" are
//! reported as different errors so callers can decide whether to show the raw text.

use crate::error::{ForecastError, Result};
use serde_json::Value;

/// Removes Markdown code fence markers (```` ```json ```` and ```` ``` ````).
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Byte range of the first top-level candidate starting at or after `from`.
fn next_candidate(text: &str, from: usize) -> Option<(usize, usize)> {
    let start = from + text[from..].find(['{', '['])?;

    let mut expected_closers: Vec<char> = Vec::new();
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
            '{' => expected_closers.push('}'),
            '[' => expected_closers.push(']'),
            '}' | ']' => {
                // A mismatched closer ends the candidate; it will fail to parse.
                if expected_closers.pop() != Some(ch) || expected_closers.is_empty() {
                    return Some((start, start + offset + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }

    Some((start, text.len()))
}

/// Extracts the first well-formed JSON object or array embedded in `text`.
pub fn extract_json(text: &str) -> Result<Value> {
    let cleaned = strip_code_fences(text);

    let mut from = 0;
    let mut first_error: Option<serde_json::Error> = None;

    while let Some((start, end)) = next_candidate(&cleaned, from) {
        match serde_json::from_str::<Value>(&cleaned[start..end]) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
        from = end;
    }

    match first_error {
        Some(source) => Err(ForecastError::JsonParse {
            source,
            raw: text.to_string(),
        }),
        None => Err(ForecastError::Extraction {
            raw: text.to_string(),
        }),
    }
}
