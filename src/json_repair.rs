//! Best-effort repair of JSON emitted by language models.
//!
//! Handles the usual ways a completion misses strict JSON:
//! - markdown code fences (```` ```json ... ``` ````)
//! - explanatory prose before or after the payload
//! - trailing commas before `}` or `]`
//! - truncated output with unclosed objects or arrays
//!
//! This is the last line of defense, not a general JSON fixer: each pass is
//! applied a bounded number of times and anything still unparseable is a
//! [`RepairError`].

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::RepairError;

/// Number of repair passes used by [`repair_default`] and [`try_parse`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Repair `text` into something `serde_json` accepts.
///
/// Text that already parses is returned unchanged.
pub fn repair(text: &str, max_attempts: u32) -> Result<String, RepairError> {
    if text.trim().is_empty() {
        return Err(RepairError::new("Empty input", text));
    }

    if is_valid_json(text) {
        return Ok(text.to_string());
    }

    let mut current = text.to_string();
    for attempt in 1..=max_attempts {
        current = strip_code_fences(&current);
        current = extract_json(&current).to_string();
        current = remove_trailing_commas(&current);
        current = balance_brackets(&current);

        if is_valid_json(&current) {
            debug!(attempt, "JSON repair succeeded");
            return Ok(current);
        }
        warn!(attempt, chars = current.len(), "JSON repair attempt failed");
    }

    Err(RepairError::new(
        format!("Failed to repair JSON after {} attempts", max_attempts),
        text,
    ))
}

/// [`repair`] with [`DEFAULT_MAX_ATTEMPTS`].
pub fn repair_default(text: &str) -> Result<String, RepairError> {
    repair(text, DEFAULT_MAX_ATTEMPTS)
}

/// Repair and parse, requiring a top-level JSON object.
///
/// Arrays and primitives are rejected even though they are valid JSON.
pub fn try_parse(text: &str) -> Result<Map<String, Value>, String> {
    let repaired = repair_default(text).map_err(|e| e.to_string())?;
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("JSON must be an object, not array or primitive".to_string()),
        Err(e) => Err(format!("JSON parse error: {}", e)),
    }
}

fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<Value>(text).is_ok()
}

/// Drop fence lines (with or without a language tag) and fence markers
/// glued to the payload.
fn strip_code_fences(text: &str) -> String {
    let mut kept = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix("```") else {
            kept.push(line.trim_end().strip_suffix("```").unwrap_or(line));
            continue;
        };
        let rest = rest.trim();
        if rest.is_empty() || rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            continue;
        }
        // Language tags are letters only; anything else is payload on the fence line.
        let payload = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        kept.push(payload.strip_suffix("```").unwrap_or(payload));
    }
    kept.join("\n").trim().to_string()
}

/// Slice from the first `{` to the last `}`, else first `[` to last `]`.
fn extract_json(text: &str) -> &str {
    if let (Some(first), Some(last)) = (text.find('{'), text.rfind('}')) {
        if last > first {
            return &text[first..=last];
        }
    }
    if let (Some(first), Some(last)) = (text.find('['), text.rfind(']')) {
        if last > first {
            return &text[first..=last];
        }
    }
    text
}

/// Remove commas (and the whitespace after them) that directly precede a
/// closing `}` or `]`. String contents are left alone.
fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                    i = j;
                    continue;
                }
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Close any objects and arrays left open, innermost first.
fn balance_brackets(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
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
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if in_string {
        out.push('"');
    }
    out.extend(stack.into_iter().rev());
    out
}
