//! The dynamic value union threaded through coercion, and the canonical
//! column data types a schema can declare.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical data type a `ColumnDefinition` can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Email,
    Uuid,
    Url,
    Json,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Datetime => "datetime",
            DataType::Email => "email",
            DataType::Uuid => "uuid",
            DataType::Url => "url",
            DataType::Json => "json",
        };
        write!(f, "{s}")
    }
}

/// A cell value whose runtime type is not statically known.
///
/// Threaded through coercion; validators pattern-match on the tag rather
/// than assuming a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Raw JSON text, kept as text rather than re-parsed on every read.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stringify for validator execution (`regex`, `minLength`, `maxLength`,
    /// `enum`) which all operate on the textual form of a cell.
    pub fn as_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                // Keep a stable textual form; avoid scientific notation for
                // the common ingestion range.
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Json(v) => v.to_string(),
        }
    }

    /// Numeric projection used by `min`/`max` validators, re-parsing the
    /// textual form when the value isn't already numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(_) | Value::Null | Value::Json(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strips_trailing_zero_floats() {
        assert_eq!(Value::Float(4.0).as_display_string(), "4");
        assert_eq!(Value::Float(3.5).as_display_string(), "3.5");
    }

    #[test]
    fn numeric_projection_reparsess_strings() {
        assert_eq!(Value::String("12.5".into()).as_f64(), Some(12.5));
        assert_eq!(Value::String("abc".into()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }
}
