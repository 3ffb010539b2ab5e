//! Best-effort JSON recovery from model output.
//!
//! Less-constrained providers ignore the structured-output directive and
//! wrap JSON in prose or fenced code blocks. The ladder here is strict
//! parse, then a fenced ```json block, then the first balanced `{...}`,
//! then a hard failure. No further guessing.

use regex::Regex;
use serde_json::Value;
use shakes_domain::error::{Error, Result};
use std::sync::OnceLock;

/// Parse JSON out of raw model output, falling through the extraction
/// ladder until something parses.
pub fn extract_json(content: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(content.trim()) {
        return Ok(value);
    }

    if let Some(block) = fenced_block(content) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Ok(value);
        }
    }

    if let Some(object) = first_balanced_object(content) {
        if let Ok(value) = serde_json::from_str::<Value>(object) {
            return Ok(value);
        }
    }

    Err(Error::JsonExtract(snippet(content)))
}

/// The body of the first fenced ```json block, if any.
fn fenced_block(content: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence regex is valid")
    });
    re.captures(content)?.get(1).map(|m| m.as_str())
}

/// The first balanced `{...}` span, honoring string literals and escapes.
fn first_balanced_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Shorten model output for an error message.
fn snippet(content: &str) -> String {
    const MAX: usize = 120;
    if content.len() <= MAX {
        content.to_string()
    } else {
        let mut end = MAX;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &content[..end])
    }
}
