use serde::{Deserialize, Serialize};

use crate::DataType;

/// Per-column type verdict produced by the infer stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredColumn {
    pub name: String,
    pub inferred_type: DataType,
    pub confidence: f64,
    pub nullable: bool,
    pub unique_ratio: f64,
    pub sample_values: Vec<String>,
    pub null_count: usize,
    pub total_count: usize,
}

/// Output of the infer stage: an ordered column list plus sampling stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredSchema {
    pub columns: Vec<InferredColumn>,
    pub row_count: usize,
    pub parse_errors: usize,
}
