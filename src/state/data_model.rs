use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub type Row = BTreeMap<String, Value>;
pub type TableData = Vec<Row>;

static NULL: Value = Value::Null;

/// Identity of a row: the primary key's display value when the grid has one,
/// otherwise the row's position in the dataset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Index(usize),
    Key(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(idx) => write!(f, "#{idx}"),
            Self::Key(key) => f.write_str(key),
        }
    }
}

pub fn row_id(row: &Row, index: usize, primary_key: Option<&str>) -> RowId {
    match primary_key {
        Some(key) => RowId::Key(display_value(field_value(row, key))),
        None => RowId::Index(index),
    }
}

/// Returns the sorted union of all keys across all rows.
pub fn derive_columns(data: &TableData) -> Vec<String> {
    let mut cols = std::collections::BTreeSet::new();
    for row in data {
        for key in row.keys() {
            cols.insert(key.clone());
        }
    }
    cols.into_iter().collect()
}

/// Reads a field, treating a missing key as `null`.
pub fn field_value<'a>(row: &'a Row, field: &str) -> &'a Value {
    row.get(field).unwrap_or(&NULL)
}

pub fn set_cell_value(data: &mut TableData, row_index: usize, column: &str, value: Value) -> bool {
    match data.get_mut(row_index) {
        Some(row) => {
            row.insert(column.to_string(), value);
            true
        }
        None => false,
    }
}

/// Formats a JSON value for display in a table cell.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                Some(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Interprets a value as a point in time. Strings may be RFC 3339, an ISO
/// date-time without offset, or a plain `YYYY-MM-DD` date; numbers are
/// milliseconds since the Unix epoch.
pub fn value_as_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_datetime(s.trim()),
        Value::Number(n) => {
            let millis = n.as_i64()?;
            DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
        }
        _ => None,
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses the longest leading decimal literal, the way user-typed text such
/// as `"12.5kg"` is read as `12.5`. Returns `None` when no digits lead.
pub fn parse_float_prefix(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    let mut digits = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return if trimmed.starts_with("Infinity") || trimmed.starts_with("+Infinity") {
            Some(f64::INFINITY)
        } else if trimmed.starts_with("-Infinity") {
            Some(f64::NEG_INFINITY)
        } else {
            None
        };
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_start {
            end = exp_end;
        }
    }
    trimmed[..end].parse::<f64>().ok()
}

pub fn json_number_from_f64(value: f64) -> Option<Number> {
    if !value.is_finite() {
        return None;
    }

    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        return Some((value as i64).into());
    }

    Number::from_f64(value)
}
