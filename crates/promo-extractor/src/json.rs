//! Locating a JSON value inside free-form model output.
//!
//! Models wrap JSON in code fences, prefix it with chatter, or append notes
//! after it. [`extract_json`] peels those layers off without ever taking the
//! naive "first `{` to last `}`" slice, which breaks as soon as a description
//! contains a brace or a second object follows.

use serde_json::Value;
use tracing::debug;

/// Upper bound on opener positions tried by the balanced scan. Each try is
/// a linear scan, so this keeps pathological output from going quadratic.
const MAX_SCAN_STARTS: usize = 64;

/// Extract the first JSON object or array from `raw`.
///
/// Returns `None` for the literal `null`, for text without a parseable
/// object/array, and for a bare JSON `null`. Only the first
/// [`MAX_SCAN_STARTS`] `{`/`[` positions are tried as the start of a value;
/// a value preceded by more unbalanced openers than that is not found.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }

    let content = strip_code_fences(trimmed);
    if content.is_empty() || content == "null" {
        return None;
    }

    if let Some(value) = try_parse(content) {
        return Some(value);
    }

    let found = content
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .take(MAX_SCAN_STARTS)
        .find_map(|(start, opener)| {
            let closer = if opener == '{' { '}' } else { ']' };
            slice_balanced(content, start, opener, closer).and_then(try_parse)
        });
    if found.is_none() {
        debug!(len = content.len(), "No JSON value found in model output");
    }
    found
}

/// Remove a leading ```` ```lang ```` fence and a trailing ```` ``` ````.
///
/// Fences elsewhere are left alone, so a backtick run inside a JSON string
/// survives.
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let info_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        text = &rest[info_len..];
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn try_parse(content: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Null) => None,
        Ok(value) if value.is_object() || value.is_array() => Some(value),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Candidate is not valid JSON");
            None
        }
    }
}

/// Slice from `start` (which must hold `opener`) to its matching `closer`.
///
/// Characters inside string literals are ignored, including escaped quotes,
/// so `"a \"}\" b"` does not close the value early.
pub fn slice_balanced(content: &str, start: usize, opener: char, closer: char) -> Option<&str> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in content[start..].char_indices() {
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

        if c == '"' {
            in_string = true;
        } else if c == opener {
            depth += 1;
        } else if c == closer {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                let end = start + offset + c.len_utf8();
                return Some(&content[start..end]);
            }
        }
    }

    None
}
