//! Structured Output Extractor
//!
//! Two phases with a bounded failure type:
//! 1. locate a single structured block (first ```json fence, else the first
//!    ``` fence, else the whole text, else the outermost bracket span)
//! 2. parse it as JSON and validate it against a `Schema`
//!
//! A successful extraction returns the parsed value unmodified.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtractionError;
use crate::schema::Schema;

/// A schema-valid value plus whether it was synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredObject {
    pub value: Value,
    pub degraded: bool,
}

impl StructuredObject {
    pub fn parsed(value: Value) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    pub fn degraded(value: Value) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}

/// Byte span of a fenced block (fence markers included) and its inner text.
struct Fence<'a> {
    start: usize,
    end: usize,
    content: &'a str,
}

fn find_fence(text: &str) -> Option<Fence<'_>> {
    let lower = text.to_ascii_lowercase();
    if let Some(start) = lower.find("```json") {
        let body_start = start + "```json".len();
        if let Some(close) = text[body_start..].find("```") {
            return Some(Fence {
                start,
                end: body_start + close + 3,
                content: text[body_start..body_start + close].trim(),
            });
        }
    }

    let start = text.find("```")?;
    let after = start + 3;
    // Skip an optional language tag on the fence line
    let body_start = match text[after..].find('\n') {
        Some(nl) if !text[after..after + nl].trim_start().starts_with(['{', '[']) => after + nl + 1,
        _ => after,
    };
    let close = text[body_start..].find("```")?;
    Some(Fence {
        start,
        end: body_start + close + 3,
        content: text[body_start..body_start + close].trim(),
    })
}

/// Locate a fenced structured block, if the response contains one.
pub fn locate_block(raw: &str) -> Option<&str> {
    find_fence(raw).map(|f| f.content)
}

/// Outermost `{...}` or `[...]` span, whichever opens first.
fn bracket_span(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let close_char = if text[open..].starts_with('{') { '}' } else { ']' };
    let close = text.rfind(close_char)?;
    (close > open).then(|| &text[open..=close])
}

fn candidate(raw: &str) -> Option<&str> {
    if let Some(block) = locate_block(raw) {
        return Some(block);
    }
    let trimmed = raw.trim();
    if trimmed.starts_with(['{', '[']) {
        return Some(trimmed);
    }
    bracket_span(trimmed)
}

/// Extract and validate a structured object from raw response text.
pub fn extract(raw: &str, schema: &Schema) -> Result<Value, ExtractionError> {
    let block = candidate(raw)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ExtractionError::no_block(raw))?;

    let value: Value =
        serde_json::from_str(block).map_err(|e| ExtractionError::parse(e.to_string(), raw))?;

    schema
        .validate(&value)
        .map_err(|violation| ExtractionError::schema(&violation, raw))?;

    Ok(value)
}

/// Split a narrative-plus-data response into the prose and the fenced block.
///
/// When there is no fence the whole text is narrative, unless the entire
/// response is itself JSON.
pub fn split_narrative(raw: &str) -> (String, Option<&str>) {
    match find_fence(raw) {
        Some(fence) => {
            let narrative = format!("{}{}", &raw[..fence.start], &raw[fence.end..]);
            (narrative.trim().to_string(), Some(fence.content))
        }
        None => {
            let trimmed = raw.trim();
            if serde_json::from_str::<Value>(trimmed).is_ok() && trimmed.starts_with(['{', '[']) {
                (String::new(), Some(trimmed))
            } else {
                (trimmed.to_string(), None)
            }
        }
    }
}
