use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InferredSchema, IngestionStatus, MappingResult, ValidationResult};

/// A process instance moving through the five-stage pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingestion {
    pub id: String,
    pub schema_id: Option<String>,
    pub status: IngestionStatus,
    pub raw_file_key: String,
    pub original_filename: Option<String>,
    pub output_file_key: Option<String>,
    pub inferred_schema: Option<InferredSchema>,
    pub mapping_result: Option<MappingResult>,
    pub validation_result: Option<ValidationResult>,
    pub row_count: Option<usize>,
    pub valid_row_count: Option<usize>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ingestion {
    pub fn new(id: impl Into<String>, raw_file_key: impl Into<String>, schema_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            schema_id,
            status: IngestionStatus::Pending,
            raw_file_key: raw_file_key.into(),
            original_filename: None,
            output_file_key: None,
            inferred_schema: None,
            mapping_result: None,
            validation_result: None,
            row_count: None,
            valid_row_count: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
