//! Post-processing: deterministic cleanup of LLM answers before parsing.
//!
//! Even with a strict prompt, models wrap JSON in ```` ```json ```` fences,
//! add a sentence before the object, emit `\r\n` or stray zero-width
//! characters, and answer numbers where the template shows strings. The raw
//! answer is kept as-is on disk; these rules only shape the copy that is
//! parsed into [`NormalizedNotice`].
//!
//! Rules (applied in order):
//! 1. Strip outer code fences (with or without a `json` tag)
//! 2. Normalise line endings (CRLF → LF)
//! 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 4. Trim trailing whitespace per line
//! 5. Cut leading/trailing prose around the outermost JSON value

use crate::output::{AuctionLot, NormalizedNotice};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Apply every cleanup rule to a raw model answer.
pub fn clean_json_answer(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    isolate_json(&s)
}

/// Parse a cleaned answer into a notice.
///
/// Accepts the documented `{"leiloes": [...]}` shape, a bare array of lots
/// and a single lot object. Scalar values that are not strings (numbers,
/// booleans) are converted to their text form. Returns `None` when the
/// answer is not JSON at all.
pub fn parse_notice(cleaned: &str) -> Option<NormalizedNotice> {
    let value: Value = serde_json::from_str(cleaned).ok()?;
    let lots = match value {
        Value::Object(mut map) => match map.remove("leiloes") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(other) => vec![other],
            None => vec![Value::Object(map)],
        },
        Value::Array(items) => items,
        _ => return None,
    };

    let leiloes = lots
        .into_iter()
        .filter_map(|lot| serde_json::from_value::<AuctionLot>(stringify_scalars(lot)).ok())
        .collect();
    Some(NormalizedNotice { leiloes })
}

fn stringify_scalars(lot: Value) -> Value {
    match lot {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::Number(n) => Value::String(n.to_string()),
                        Value::Bool(b) => Value::String(b.to_string()),
                        Value::Array(_) | Value::Object(_) => Value::String(v.to_string()),
                        other => other,
                    };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Isolate the JSON value ───────────────────────────────────────────
//
// "Segue o JSON: { ... } Espero ter ajudado." → "{ ... }". The cut runs from
// the first `{` or `[` to the last matching closer; text with neither is
// returned trimmed and left for the parser to reject.

fn isolate_json(input: &str) -> String {
    let trimmed = input.trim();
    let start = match trimmed.find(['{', '[']) {
        Some(i) => i,
        None => return trimmed.to_string(),
    };
    let closer = if trimmed[start..].starts_with('{') {
        '}'
    } else {
        ']'
    };
    match trimmed.rfind(closer) {
        Some(end) if end > start => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
