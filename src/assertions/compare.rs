use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

use super::kind::DataType;
use crate::extract::Extracted;

/// A value coerced to its declared data type
#[derive(Debug, Clone)]
enum Typed {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Dict(Map<String, Value>),
    Raw(Value),
}

impl fmt::Display for Typed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typed::Str(s) => write!(f, "\"{}\"", s),
            Typed::Int(n) => write!(f, "{}", n),
            Typed::Float(n) => write!(f, "{}", n),
            Typed::Bool(b) => write!(f, "{}", b),
            Typed::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Typed::List(items) => write!(f, "{}", Value::Array(items.clone())),
            Typed::Dict(map) => write!(f, "{}", Value::Object(map.clone())),
            Typed::Raw(v) => write!(f, "{}", v),
        }
    }
}

fn coerce(value: &Value, data_type: DataType) -> Result<Typed, String> {
    let mismatch = || format!("{} is not a valid {}", value, data_type);

    match data_type {
        DataType::String => match value {
            Value::String(s) => Ok(Typed::Str(s.clone())),
            Value::Number(n) => Ok(Typed::Str(n.to_string())),
            Value::Bool(b) => Ok(Typed::Str(b.to_string())),
            _ => Err(mismatch()),
        },
        DataType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(Typed::Int)
                .ok_or_else(mismatch),
            Value::String(s) => s.trim().parse().map(Typed::Int).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Float => match value {
            Value::Number(n) => n.as_f64().map(Typed::Float).ok_or_else(mismatch),
            Value::String(s) => s.trim().parse().map(Typed::Float).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Bool => match value {
            Value::Bool(b) => Ok(Typed::Bool(*b)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(Typed::Bool(true)),
                "false" => Ok(Typed::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        DataType::Date => match value {
            Value::String(s) => parse_date(s).map(Typed::Date).ok_or_else(mismatch),
            Value::Number(n) => n
                .as_i64()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .map(Typed::Date)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        DataType::List => match value {
            Value::Array(items) => Ok(Typed::List(items.clone())),
            _ => Err(mismatch()),
        },
        DataType::Dict => match value {
            Value::Object(map) => Ok(Typed::Dict(map.clone())),
            _ => Err(mismatch()),
        },
        DataType::Any => Ok(Typed::Raw(value.clone())),
    }
}

/// RFC 3339, naive ISO datetimes (taken as UTC) and plain `YYYY-MM-DD`
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// JSON equality that treats 1 and 1.0 as equal
fn loose_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => float_equal(x, y),
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loose_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| loose_equal(x, y)))
        }
        _ => a == b,
    }
}

fn float_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()).max(1.0)
}

fn typed_equal(a: &Typed, b: &Typed) -> bool {
    match (a, b) {
        (Typed::Str(x), Typed::Str(y)) => x == y,
        (Typed::Int(x), Typed::Int(y)) => x == y,
        (Typed::Float(x), Typed::Float(y)) => float_equal(*x, *y),
        (Typed::Bool(x), Typed::Bool(y)) => x == y,
        (Typed::Date(x), Typed::Date(y)) => x == y,
        (Typed::List(x), Typed::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| loose_equal(a, b))
        }
        (Typed::Dict(x), Typed::Dict(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, a)| y.get(k).map_or(false, |b| loose_equal(a, b)))
        }
        (Typed::Raw(x), Typed::Raw(y)) => loose_equal(x, y),
        _ => false,
    }
}

fn typed_ordering(a: &Typed, b: &Typed) -> Option<Ordering> {
    match (a, b) {
        (Typed::Str(x), Typed::Str(y)) => Some(x.cmp(y)),
        (Typed::Int(x), Typed::Int(y)) => Some(x.cmp(y)),
        (Typed::Float(x), Typed::Float(y)) => x.partial_cmp(y),
        (Typed::Date(x), Typed::Date(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Coerce both sides, naming which side failed
fn coerce_pair(actual: &Value, expected: &Value, data_type: DataType) -> Result<(Typed, Typed), String> {
    let actual = coerce(actual, data_type).map_err(|e| format!("actual value: {}", e))?;
    let expected = coerce(expected, data_type).map_err(|e| format!("expected value: {}", e))?;
    Ok((actual, expected))
}

fn present<'a>(actual: &Extracted<'a>) -> Result<&'a Value, String> {
    match actual {
        Extracted::Absent => Err("key not found".to_string()),
        Extracted::Value(Value::Null) => Err("value is null".to_string()),
        Extracted::Value(v) => Ok(*v),
    }
}

pub fn equals(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    if actual.is_null() && expected.is_null() {
        return Ok(());
    }
    if expected.is_null() {
        return Err(format!("expected null but got {}", actual));
    }
    let value = present(actual).map_err(|e| format!("{}, expected {}", e, expected))?;
    let (a, e) = coerce_pair(value, expected, data_type)?;
    if typed_equal(&a, &e) {
        Ok(())
    } else {
        Err(format!("expected {} but got {}", e, a))
    }
}

pub fn not_equals(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    match (actual.is_null(), expected.is_null()) {
        (true, true) => return Err("expected a non-null value but got null".to_string()),
        (true, false) | (false, true) => return Ok(()),
        (false, false) => {}
    }
    let value = present(actual)?;
    let (a, e) = coerce_pair(value, expected, data_type)?;
    if typed_equal(&a, &e) {
        Err(format!("expected a value different from {}", e))
    } else {
        Ok(())
    }
}

fn check_ordering(
    actual: &Extracted<'_>,
    expected: &Value,
    data_type: DataType,
    symbol: &str,
    accept: fn(Ordering) -> bool,
) -> Result<(), String> {
    let value = present(actual)?;
    let (a, e) = coerce_pair(value, expected, data_type)?;
    match typed_ordering(&a, &e) {
        Some(ordering) if accept(ordering) => Ok(()),
        Some(_) => Err(format!("expected value {} {} but got {}", symbol, e, a)),
        None => Err(format!("cannot order {} against {}", a, e)),
    }
}

pub fn greater_than(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    check_ordering(actual, expected, data_type, ">", |o| o == Ordering::Greater)
}

pub fn greater_than_or_equal(
    actual: &Extracted<'_>,
    expected: &Value,
    data_type: DataType,
) -> Result<(), String> {
    check_ordering(actual, expected, data_type, ">=", |o| o != Ordering::Less)
}

pub fn less_than(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    check_ordering(actual, expected, data_type, "<", |o| o == Ordering::Less)
}

pub fn less_than_or_equal(
    actual: &Extracted<'_>,
    expected: &Value,
    data_type: DataType,
) -> Result<(), String> {
    check_ordering(actual, expected, data_type, "<=", |o| o != Ordering::Greater)
}

/// Whether `actual` contains `expected`: substring, list element, or dict key/subset
fn contains_value(actual: &Value, expected: &Value, data_type: DataType) -> Result<bool, String> {
    let typed = coerce(actual, data_type).map_err(|e| format!("actual value: {}", e))?;
    let typed = match typed {
        Typed::Raw(Value::String(s)) => Typed::Str(s),
        Typed::Raw(Value::Array(items)) => Typed::List(items),
        Typed::Raw(Value::Object(map)) => Typed::Dict(map),
        other => other,
    };

    match typed {
        Typed::Str(haystack) => {
            let needle = match expected {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(haystack.contains(&needle))
        }
        Typed::List(items) => Ok(items.iter().any(|item| loose_equal(item, expected))),
        Typed::Dict(map) => match expected {
            Value::String(key) => Ok(map.contains_key(key)),
            Value::Object(subset) => Ok(subset
                .iter()
                .all(|(k, v)| map.get(k).map_or(false, |actual| loose_equal(actual, v)))),
            other => Err(format!("cannot look up {} in a dict", other)),
        },
        other => Err(format!("{} is not a string, list or dict", other)),
    }
}

pub fn contains(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    let value = present(actual)?;
    if contains_value(value, expected, data_type)? {
        Ok(())
    } else {
        Err(format!("{} does not contain {}", value, expected))
    }
}

pub fn not_contains(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    let value = present(actual)?;
    if contains_value(value, expected, data_type)? {
        Err(format!("{} unexpectedly contains {}", value, expected))
    } else {
        Ok(())
    }
}

pub fn matches(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    let value = present(actual)?;
    let text = match coerce(value, data_type)? {
        Typed::Str(s) => s,
        other => return Err(format!("{} is not a string", other)),
    };
    let pattern = expected
        .as_str()
        .ok_or_else(|| format!("regex pattern must be a string, got {}", expected))?;
    let re = Regex::new(pattern).map_err(|e| format!("invalid regex '{}': {}", pattern, e))?;
    if re.is_match(&text) {
        Ok(())
    } else {
        Err(format!("\"{}\" does not match /{}/", text, pattern))
    }
}

pub fn length_equals(actual: &Extracted<'_>, expected: &Value, data_type: DataType) -> Result<(), String> {
    let value = present(actual)?;
    let expected_len = expected
        .as_u64()
        .or_else(|| expected.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| format!("expected length must be a non-negative integer, got {}", expected))?;

    let actual_len = match coerce(value, data_type)? {
        Typed::Str(s) => s.chars().count(),
        Typed::List(items) => items.len(),
        Typed::Dict(map) => map.len(),
        other => return Err(format!("{} has no length", other)),
    };
    let actual_len = actual_len as u64;

    if actual_len == expected_len {
        Ok(())
    } else {
        Err(format!("expected length {} but got {}", expected_len, actual_len))
    }
}

pub fn is_truthy(actual: &Extracted<'_>) -> Result<(), String> {
    if actual.is_truthy() {
        Ok(())
    } else {
        Err(format!("expected a truthy value but got {}", actual))
    }
}

pub fn is_falsy(actual: &Extracted<'_>) -> Result<(), String> {
    if actual.is_truthy() {
        Err(format!("expected a falsy value but got {}", actual))
    } else {
        Ok(())
    }
}

pub fn is_null(actual: &Extracted<'_>) -> Result<(), String> {
    if actual.is_null() {
        Ok(())
    } else {
        Err(format!("expected null but got {}", actual))
    }
}

pub fn is_not_null(actual: &Extracted<'_>) -> Result<(), String> {
    if actual.is_null() {
        Err(format!("expected a value but got {}", actual))
    } else {
        Ok(())
    }
}
