//! Tolerant parsing of model completions.
//!
//! Generative backends frequently ignore formatting instructions: they
//! wrap JSON in markdown fences, prepend chatter, or fall back to a
//! numbered list. Query parsing is therefore an ordered chain of
//! [`ParseStrategy`] functions. Each one returns `Some(queries)` on a
//! non-empty result or `None` for "no match", and the next strategy runs
//! only when the previous one produced nothing.
//!
//! | Order | Strategy | Accepts |
//! |-------|----------|---------|
//! | 1 | [`parse_direct_json`] | The whole (fence-stripped) response as JSON |
//! | 2 | [`parse_embedded_array`] | The first balanced `[...]` span |
//! | 3 | [`parse_lines`] | One query per list item or line |

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// How aggressively bare (unmarked) lines are filtered in line parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Bare lines must be longer than 5 characters.
    #[default]
    Standard,
    /// Bare lines must be longer than 10 characters.
    Strict,
}

impl Strictness {
    pub fn min_len(&self) -> usize {
        match self {
            Strictness::Standard => 5,
            Strictness::Strict => 10,
        }
    }
}

/// A single parsing strategy: `None` means "no match, try the next one".
pub type ParseStrategy = fn(&str, Strictness) -> Option<Vec<String>>;

/// The ordered strategy chain.
pub const STRATEGIES: &[(&str, ParseStrategy)] = &[
    ("json", parse_direct_json),
    ("embedded-array", parse_embedded_array),
    ("lines", parse_lines),
];

fn fence_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z]*[ \t]*").expect("valid fence regex"))
}

fn list_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[.)]\s*").expect("valid numbering regex"))
}

fn list_bullet() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*•]\s*").expect("valid bullet regex"))
}

/// Remove every markdown code fence marker (with optional language tag).
pub fn strip_fences(raw: &str) -> String {
    fence_open().replace_all(raw, "").trim().to_string()
}

/// Parse the fence-stripped response and return the first strategy's
/// result, cleaned and truncated to `limit`. Returns the strategy name
/// alongside the queries; an empty vector means every strategy failed.
pub fn parse_queries(raw: &str, limit: usize, strictness: Strictness) -> (Vec<String>, Option<&'static str>) {
    let cleaned = strip_fences(raw);
    for (name, strategy) in STRATEGIES {
        if let Some(found) = strategy(&cleaned, strictness) {
            let queries = clean_queries(found, limit);
            if !queries.is_empty() {
                return (queries, Some(name));
            }
        }
    }
    (Vec::new(), None)
}

/// Strategy 1: the entire response is a JSON array (or a wrapper object
/// holding one).
pub fn parse_direct_json(text: &str, _strictness: Strictness) -> Option<Vec<String>> {
    let trimmed = text.trim();
    let looks_like_json = (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'));
    if !looks_like_json {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    non_empty(queries_from_value(&value))
}

/// Strategy 2: the first balanced `[...]` span embedded in prose.
pub fn parse_embedded_array(text: &str, _strictness: Strictness) -> Option<Vec<String>> {
    let span = first_balanced_array(text)?;
    let value: Value = serde_json::from_str(span).ok()?;
    non_empty(queries_from_value(&value))
}

/// Strategy 3: one query per line.
///
/// Numbering (`1.`, `2)`) and bullets (`-`, `*`, `•`) are stripped, as
/// are trailing commas and wrapping quotes. Lines that carried a list
/// marker or quotes are kept at any length; bare lines must be longer
/// than the strictness minimum so that chatter like "Sure!" is dropped.
pub fn parse_lines(text: &str, strictness: Strictness) -> Option<Vec<String>> {
    let mut queries = Vec::new();
    for line in text.lines() {
        let line = line
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(|c| c == ']' || c == ',')
            .trim();
        if line.is_empty() || matches!(line, "{" | "}") {
            continue;
        }

        let mut marked = false;
        let mut item = line;
        if let Some(m) = list_number().find(item) {
            item = &item[m.end()..];
            marked = true;
        } else if let Some(m) = list_bullet().find(item) {
            item = &item[m.end()..];
            marked = true;
        }

        let item = item.trim().trim_end_matches(',').trim();
        let (item, quoted) = strip_wrapping_quotes(item);
        let item = item.trim();

        if item.is_empty() {
            continue;
        }
        if !(marked || quoted) && item.chars().count() <= strictness.min_len() {
            continue;
        }
        queries.push(item.to_string());
    }
    non_empty(queries)
}

/// Final cleanup shared by all strategies: trim, strip wrapper quotes,
/// drop empties and JSON fragments, drop exact duplicates, truncate.
pub fn clean_queries(queries: Vec<String>, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for q in queries {
        let q = q.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string();
        if q.is_empty() || q.starts_with('[') || q.starts_with('{') {
            continue;
        }
        if !out.contains(&q) {
            out.push(q);
        }
    }
    out.truncate(limit);
    out
}

/// Extract query strings from a parsed JSON value.
///
/// Accepts an array of strings, an array of objects with a `"query"`
/// field, or an object wrapping such an array under `queries`,
/// `synthetic_queries`, or `expanded_queries`.
fn queries_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("query").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect(),
        Value::Object(obj) => ["queries", "synthetic_queries", "expanded_queries"]
            .iter()
            .find_map(|key| obj.get(*key))
            .map(queries_from_value)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Find the first `[` and its matching `]`, skipping brackets inside
/// JSON string literals.
fn first_balanced_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_wrapping_quotes(s: &str) -> (&str, bool) {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return (&s[1..s.len() - 1], true);
        }
    }
    (s, false)
}

fn non_empty(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

/// Parse a JSON object out of a possibly fenced completion.
pub fn parse_json_object<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let cleaned = strip_fences(raw);
    if let Ok(v) = serde_json::from_str(&cleaned) {
        return Some(v);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}
