//! Type coercion shared by the validate stage (full validator loop) and the
//! output stage (lightweight re-coercion, no validators).

use crate::patterns::{date_re, email_re, uuid_re};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ingest_protocol::{CellError, DataType, Value};
use ingest_schema::ColumnDefinition;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y"];

/// US-ordered `MM/DD/YYYY` / `MM-DD-YYYY` formats are tried after the
/// unambiguous ISO and `YYYY/MM/DD` forms, since those are ambiguous
/// against day-first locales otherwise.
fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    parse_date(value).map(|d| DateTime::from_naive_utc_and_offset(d.and_hms_opt(0, 0, 0).unwrap(), Utc))
}

fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::Json(other.clone()),
    }
}

/// Resolve an empty/missing raw value. Returns the resolved value and, if
/// the column was required, a `CellError`.
fn resolve_empty(column: &ColumnDefinition) -> (Value, Option<CellError>) {
    if column.nullable {
        (Value::Null, None)
    } else if let Some(default) = &column.default {
        (json_to_value(default), None)
    } else if column.required {
        (Value::Null, Some(CellError::required_missing(&column.name)))
    } else {
        (Value::Null, None)
    }
}

/// Coerce one raw cell string into the column's declared type. `raw` is
/// `None`/empty for a missing value. On coercion failure
/// the raw value is kept as a string (so `flag` rows reflect their
/// original content) unless a default is declared.
pub fn coerce_cell(raw: Option<&str>, column: &ColumnDefinition) -> (Value, Option<CellError>) {
    let raw = raw.unwrap_or("").trim();
    if raw.is_empty() {
        return resolve_empty(column);
    }

    let fail = |message: String| -> (Value, Option<CellError>) {
        let error = CellError::type_coercion(&column.name, raw, message);
        let fallback = column.default.as_ref().map(json_to_value).unwrap_or_else(|| Value::String(raw.to_string()));
        (fallback, Some(error))
    };

    match column.data_type {
        DataType::String => (Value::String(raw.to_string()), None),
        DataType::Integer => match raw.parse::<i64>() {
            Ok(i) => (Value::Int(i), None),
            Err(_) => fail(format!("'{raw}' is not a valid integer")),
        },
        DataType::Float => {
            if raw.matches('.').count() > 1 {
                return fail(format!("'{raw}' has multiple decimal points"));
            }
            match raw.parse::<f64>() {
                Ok(f) => (Value::Float(f), None),
                Err(_) => fail(format!("'{raw}' is not a valid float")),
            }
        }
        DataType::Boolean => {
            let lower = raw.to_ascii_lowercase();
            if ["true", "1", "yes", "y", "on"].contains(&lower.as_str()) {
                (Value::Bool(true), None)
            } else if ["false", "0", "no", "n", "off"].contains(&lower.as_str()) {
                (Value::Bool(false), None)
            } else {
                fail(format!("'{raw}' is not a valid boolean"))
            }
        }
        DataType::Date => match parse_date(raw) {
            Some(d) => (Value::String(d.format("%Y-%m-%d").to_string()), None),
            None => fail(format!("'{raw}' does not match a recognized date format")),
        },
        DataType::Datetime => match parse_datetime(raw) {
            Some(dt) => (Value::String(dt.to_rfc3339()), None),
            None => fail(format!("'{raw}' does not match a recognized datetime format")),
        },
        DataType::Email => {
            if email_re().is_match(raw) {
                (Value::String(raw.to_ascii_lowercase()), None)
            } else {
                fail(format!("'{raw}' is not a valid email address"))
            }
        }
        DataType::Uuid => {
            if uuid_re().is_match(raw) {
                (Value::String(raw.to_ascii_lowercase()), None)
            } else {
                fail(format!("'{raw}' is not a valid uuid"))
            }
        }
        DataType::Url => match url::Url::parse(raw) {
            Ok(u) if u.has_host() => (Value::String(raw.to_string()), None),
            _ => fail(format!("'{raw}' is not a valid absolute url")),
        },
        DataType::Json => match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) => (Value::Json(v), None),
            Err(_) => fail(format!("'{raw}' is not valid json")),
        },
    }
}

/// `date_re` is used by the output stage to short-circuit an already
/// ISO-normalized date without re-running the full format ladder.
pub fn looks_like_iso_date(raw: &str) -> bool {
    date_re().is_match(raw)
}
