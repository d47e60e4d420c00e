//! Normalization of execution records and key-path lookup.
//!
//! The executions API returns `argument`, `result` and `error.payload` as
//! JSON-encoded strings. [`normalize_execution`] decodes them so assertions
//! can address nested fields such as `result.items[0].id`.

use serde_json::{Map, Value};
use std::fmt;

use crate::client::ExecutionRecord;

/// Outcome of resolving a key path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extracted<'a> {
    /// Some segment of the path did not exist
    Absent,
    Value(&'a Value),
}

impl<'a> Extracted<'a> {
    /// Absent and JSON null both count as null
    pub fn is_null(&self) -> bool {
        matches!(self, Extracted::Absent | Extracted::Value(Value::Null))
    }

    /// Falsy set: absent, null, "", 0, empty list/object, false
    pub fn is_truthy(&self) -> bool {
        match self {
            Extracted::Absent => false,
            Extracted::Value(value) => is_truthy(value),
        }
    }
}

impl fmt::Display for Extracted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extracted::Absent => f.write_str("<absent>"),
            Extracted::Value(value) => f.write_str(&value.to_string()),
        }
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// One step of a key path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse `a.b[0]["c.d"]` into segments
pub fn parse_key_path(path: &str) -> Result<Vec<PathSegment>, String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("empty key path".to_string());
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    // Only '.' or '[' may follow a closing bracket
    let mut after_bracket = false;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if current.is_empty() && !after_bracket {
                    return Err(format!("empty segment at position {} in '{}'", i, path));
                }
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                after_bracket = false;
                i += 1;
                if i == chars.len() {
                    return Err(format!("trailing '.' in '{}'", path));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let close = find_bracket_close(&chars, i)
                    .ok_or_else(|| format!("unclosed '[' in '{}'", path))?;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(parse_bracket(inner.trim(), path)?);
                after_bracket = true;
                i = close + 1;
            }
            ']' => return Err(format!("unexpected ']' in '{}'", path)),
            c => {
                if after_bracket {
                    return Err(format!("expected '.' or '[' after ']' in '{}'", path));
                }
                current.push(c);
                i += 1;
            }
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    Ok(segments)
}

/// Index of the `]` closing the bracket opened at `open`, skipping quoted text
fn find_bracket_close(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in chars[open + 1..].iter().enumerate() {
        match (quote, *c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(*c),
            (None, ']') => return Some(open + 1 + offset),
            (None, _) => {}
        }
    }
    None
}

fn parse_bracket(inner: &str, path: &str) -> Result<PathSegment, String> {
    let quoted = (inner.starts_with('"') && inner.ends_with('"'))
        || (inner.starts_with('\'') && inner.ends_with('\''));
    if quoted && inner.len() >= 2 {
        return Ok(PathSegment::Key(inner[1..inner.len() - 1].to_string()));
    }
    inner
        .parse::<usize>()
        .map(PathSegment::Index)
        .map_err(|_| format!("invalid index '[{}]' in '{}'", inner, path))
}

/// Resolve a key path. A malformed path is an error; a missing segment is `Absent`.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Result<Extracted<'a>, String> {
    let segments = parse_key_path(path)?;

    let mut current = document;
    for segment in &segments {
        let next = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Key(key), Value::Array(items)) => {
                key.parse::<usize>().ok().and_then(|idx| items.get(idx))
            }
            (PathSegment::Index(idx), Value::Array(items)) => items.get(*idx),
            (PathSegment::Index(idx), Value::Object(map)) => map.get(&idx.to_string()),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(Extracted::Absent),
        }
    }
    Ok(Extracted::Value(current))
}

/// Decode a JSON-encoded payload, keeping the raw string when it is not JSON
fn decode_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Build the addressable document for an execution record
pub fn normalize_execution(record: &ExecutionRecord) -> Value {
    let mut doc = Map::new();
    doc.insert("name".into(), Value::String(record.name.clone()));
    doc.insert("state".into(), Value::String(record.state.to_string()));

    let optional_fields = [
        ("startTime", &record.start_time),
        ("endTime", &record.end_time),
        ("duration", &record.duration),
        ("workflowRevisionId", &record.workflow_revision_id),
        ("callLogLevel", &record.call_log_level),
    ];
    for (key, value) in optional_fields {
        if let Some(v) = value {
            doc.insert(key.into(), Value::String(v.clone()));
        }
    }

    if let Some(argument) = &record.argument {
        doc.insert("argument".into(), decode_payload(argument));
    }
    if let Some(result) = &record.result {
        doc.insert("result".into(), decode_payload(result));
    }
    if let Some(error) = &record.error {
        let mut err = Map::new();
        if let Some(payload) = &error.payload {
            err.insert("payload".into(), decode_payload(payload));
        }
        if let Some(context) = &error.context {
            err.insert("context".into(), Value::String(context.clone()));
        }
        doc.insert("error".into(), Value::Object(err));
    }

    Value::Object(doc)
}
