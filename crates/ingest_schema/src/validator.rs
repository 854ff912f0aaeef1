use serde::{Deserialize, Serialize};

/// A per-cell or whole-dataset validator declared on a `ColumnDefinition`.
/// Closed tagged union; dispatch happens via match in the validate stage,
/// not dynamic trait objects, since the variant set is fixed by the
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Validator {
    Regex {
        pattern: String,
        message: Option<String>,
    },
    Min {
        value: f64,
        message: Option<String>,
    },
    Max {
        value: f64,
        message: Option<String>,
    },
    MinLength {
        value: usize,
        message: Option<String>,
    },
    MaxLength {
        value: usize,
        message: Option<String>,
    },
    Enum {
        values: Vec<String>,
        message: Option<String>,
    },
    /// Whole-dataset validator: tracked via a per-column `seen` set across
    /// rows rather than per-cell. Routed separately from the others.
    Unique { message: Option<String> },
}

impl Validator {
    /// The variant name used as `validatorType` on a `CellError` and as the
    /// journal's validator identifier.
    pub fn kind(&self) -> &'static str {
        match self {
            Validator::Regex { .. } => "regex",
            Validator::Min { .. } => "min",
            Validator::Max { .. } => "max",
            Validator::MinLength { .. } => "minLength",
            Validator::MaxLength { .. } => "maxLength",
            Validator::Enum { .. } => "enum",
            Validator::Unique { .. } => "unique",
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, Validator::Unique { .. })
    }

    pub fn default_message(&self) -> String {
        match self {
            Validator::Regex { pattern, .. } => format!("value does not match pattern '{pattern}'"),
            Validator::Min { value, .. } => format!("value is below minimum {value}"),
            Validator::Max { value, .. } => format!("value is above maximum {value}"),
            Validator::MinLength { value, .. } => format!("value is shorter than minimum length {value}"),
            Validator::MaxLength { value, .. } => format!("value is longer than maximum length {value}"),
            Validator::Enum { values, .. } => format!("value is not one of {values:?}"),
            Validator::Unique { .. } => "value is not unique".to_string(),
        }
    }

    pub fn message(&self) -> String {
        let explicit = match self {
            Validator::Regex { message, .. }
            | Validator::Min { message, .. }
            | Validator::Max { message, .. }
            | Validator::MinLength { message, .. }
            | Validator::MaxLength { message, .. }
            | Validator::Enum { message, .. }
            | Validator::Unique { message } => message.clone(),
        };
        explicit.unwrap_or_else(|| self.default_message())
    }
}
