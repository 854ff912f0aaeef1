//! Cell- and row-scoped error taxonomy.

use serde::{Deserialize, Serialize};

/// Kind of cell-level error. These never abort a stage by themselves
///: they are recorded and the row's disposition follows the
/// schema's `errorPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellErrorType {
    RequiredMissing,
    TypeCoercion,
    ValidationFailed,
}

/// A single cell-scoped error, attributed to a row/column pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellError {
    pub column: String,
    pub error_type: CellErrorType,
    /// Present only for `validation_failed` errors; names which validator
    /// variant rejected the cell (`regex`, `min`, `max`, `minLength`,
    /// `maxLength`, `enum`, `unique`).
    pub validator_type: Option<String>,
    pub message: String,
    pub raw_value: Option<String>,
}

impl CellError {
    pub fn required_missing(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            message: format!("column '{column}' is required but missing"),
            column,
            error_type: CellErrorType::RequiredMissing,
            validator_type: None,
            raw_value: None,
        }
    }

    pub fn type_coercion(column: impl Into<String>, raw_value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            error_type: CellErrorType::TypeCoercion,
            validator_type: None,
            message: message.into(),
            raw_value: Some(raw_value.into()),
        }
    }

    pub fn validation_failed(
        column: impl Into<String>,
        validator_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            error_type: CellErrorType::ValidationFailed,
            validator_type: Some(validator_type.into()),
            message: message.into(),
            raw_value: None,
        }
    }
}

/// What happened to a row containing at least one cell error, under the
/// schema's `errorPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    /// Row had no cell errors.
    Valid,
    /// `flag` policy: row retained, errors recorded.
    Flagged,
    /// `reject_row` policy: row excluded from output.
    Rejected,
    /// `coerce_default` policy: offending cells replaced by column defaults.
    Coerced,
}

/// Full per-row error record, 1-indexed for human display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub action: RowAction,
    pub errors: Vec<CellError>,
}
