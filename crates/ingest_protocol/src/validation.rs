use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::RowError;

/// Output of the validate stage.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationResult {
    pub valid_row_count: usize,
    pub invalid_row_count: usize,
    pub row_errors: Vec<RowError>,
    /// Histogram of cell error counts keyed by column name.
    pub errors_by_column: HashMap<String, usize>,
}
