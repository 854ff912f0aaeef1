//! Validate stage: coercion + validator execution + row
//! classification under the schema's error policy.

use crate::coerce::coerce_cell;
use crate::error::{Result, StageError};
use ingest_journal::{DecisionEntry, Journal, Stage};
use ingest_protocol::{CellError, ColumnMapping, RowAction, RowError, Value, ValidationResult};
use ingest_schema::{CanonicalSchema, ErrorPolicy, Validator};
use regex::Regex;
use serde_json::json;
use std::collections::{HashMap, HashSet};

/// Reverse index from target column name to the source column mapped to
/// it, so a cell's raw value is looked up via the target column name.
fn reverse_index(mappings: &[ColumnMapping]) -> HashMap<&str, &str> {
    mappings
        .iter()
        .filter_map(|m| m.target_column.as_deref().map(|target| (target, m.source_column.as_str())))
        .collect()
}

fn run_validator(value: &Value, validator: &Validator, seen_unique: &mut HashSet<String>) -> Option<CellError> {
    let text = value.as_display_string();
    let fails = match validator {
        Validator::Regex { pattern, .. } => {
            Regex::new(pattern).map(|re| !re.is_match(&text)).unwrap_or(false)
        }
        Validator::Min { value: min, .. } => value.as_f64().map(|n| n < *min).unwrap_or(false),
        Validator::Max { value: max, .. } => value.as_f64().map(|n| n > *max).unwrap_or(false),
        Validator::MinLength { value: min, .. } => text.chars().count() < *min,
        Validator::MaxLength { value: max, .. } => text.chars().count() > *max,
        Validator::Enum { values, .. } => !values.iter().any(|v| v == &text),
        Validator::Unique { .. } => !seen_unique.insert(text.clone()),
    };
    fails.then(|| CellError::validation_failed("", validator.kind(), validator.message()))
}

/// Validate one row against the schema, returning its cell errors.
fn validate_row(row: &[String], columns: &[String], reverse: &HashMap<&str, &str>, schema: &CanonicalSchema, unique_seen: &mut HashMap<String, HashSet<String>>) -> Vec<CellError> {
    let mut errors = Vec::new();
    for column in &schema.columns {
        let raw = reverse
            .get(column.name.as_str())
            .and_then(|source| columns.iter().position(|c| c.as_str() == *source))
            .and_then(|idx| row.get(idx))
            .map(|s| s.as_str());

        let (value, coercion_error) = coerce_cell(raw, column);
        if let Some(mut error) = coercion_error {
            error.column = column.name.clone();
            errors.push(error);
        }

        for validator in &column.validators {
            let seen = unique_seen.entry(column.name.clone()).or_default();
            if let Some(mut error) = run_validator(&value, validator, seen) {
                error.column = column.name.clone();
                errors.push(error);
            }
        }
    }
    errors
}

/// Passthrough validation: every mapped cell is
/// copied verbatim, no coercion or validators run.
fn passthrough_result(total_rows: usize) -> ValidationResult {
    ValidationResult { valid_row_count: total_rows, invalid_row_count: 0, row_errors: Vec::new(), errors_by_column: HashMap::new() }
}

/// Run the validate stage over a full re-parse of the raw file: no sample
/// cap, unlike infer.
pub async fn run(
    ingestion_id: &str,
    columns: &[String],
    rows: &[Vec<String>],
    mappings: &[ColumnMapping],
    schema: Option<&CanonicalSchema>,
    journal: &dyn Journal,
) -> Result<ValidationResult> {
    let result = compute(columns, rows, mappings, schema)?;

    // Idempotency: purge prior validate entries before
    // re-appending so retries never double-count.
    journal.purge_stage(ingestion_id, Stage::Validate).await?;
    journal
        .append(DecisionEntry::new(
            ingestion_id,
            Stage::Validate,
            "validation_complete",
            json!({
                "errorPolicy": schema.map(|s| s.error_policy),
                "validRowCount": result.valid_row_count,
                "invalidRowCount": result.invalid_row_count,
                "errorsByColumn": result.errors_by_column,
                "sampleRowErrors": result.row_errors.iter().take(10).collect::<Vec<_>>(),
            }),
        ))
        .await?;

    Ok(result)
}

fn compute(
    columns: &[String],
    rows: &[Vec<String>],
    mappings: &[ColumnMapping],
    schema: Option<&CanonicalSchema>,
) -> Result<ValidationResult> {
    let Some(schema) = schema else {
        return Ok(passthrough_result(rows.len()));
    };

    let reverse = reverse_index(mappings);
    let mut unique_seen: HashMap<String, HashSet<String>> = HashMap::new();
    let mut row_errors = Vec::new();
    let mut errors_by_column: HashMap<String, usize> = HashMap::new();
    let mut valid_row_count = 0;
    let mut invalid_row_count = 0;

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + 1;
        let errors = validate_row(row, columns, &reverse, schema, &mut unique_seen);

        if errors.is_empty() {
            valid_row_count += 1;
            continue;
        }

        invalid_row_count += 1;
        for error in &errors {
            *errors_by_column.entry(error.column.clone()).or_insert(0) += 1;
        }

        let action = match schema.error_policy {
            ErrorPolicy::Flag => RowAction::Flagged,
            ErrorPolicy::RejectRow => RowAction::Rejected,
            ErrorPolicy::CoerceDefault => RowAction::Coerced,
            ErrorPolicy::Abort => {
                let message = errors[0].message.clone();
                return Err(StageError::Aborted(format!("row {row_number}: {message}")));
            }
        };

        row_errors.push(RowError { row_number, action, errors });
    }

    Ok(ValidationResult { valid_row_count, invalid_row_count, row_errors, errors_by_column })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_journal::MemoryJournal;
    use ingest_protocol::{DataType, MappingMethod};
    use ingest_schema::ColumnDefinition;

    fn identity_mapping(names: &[&str]) -> Vec<ColumnMapping> {
        names
            .iter()
            .map(|n| ColumnMapping {
                source_column: n.to_string(),
                target_column: Some(n.to_string()),
                method: MappingMethod::Exact,
                confidence: 1.0,
                alternative_mappings: vec![],
            })
            .collect()
    }

    #[test]
    fn unique_and_enum_scenario_flags_two_rows() {
        let schema = CanonicalSchema {
            name: "orders".into(),
            version: 1,
            description: None,
            columns: vec![
                ColumnDefinition::new("order_id", DataType::String).required().with_validators(vec![Validator::Unique { message: None }]),
                ColumnDefinition::new("status", DataType::String).with_validators(vec![Validator::Enum {
                    values: vec!["pending".into(), "shipped".into(), "delivered".into()],
                    message: None,
                }]),
            ],
            error_policy: ErrorPolicy::Flag,
            strict: false,
        };
        let columns = vec!["order_id".to_string(), "status".to_string()];
        let rows = vec![
            vec!["ORD-1".to_string(), "pending".to_string()],
            vec!["ORD-1".to_string(), "SHIPPED".to_string()],
            vec!["ORD-2".to_string(), "unknown".to_string()],
        ];
        let mappings = identity_mapping(&["order_id", "status"]);

        let result = compute(&columns, &rows, &mappings, Some(&schema)).unwrap();
        assert_eq!(result.valid_row_count, 1);
        assert_eq!(result.invalid_row_count, 2);
    }

    #[test]
    fn reject_row_policy_excludes_offending_rows_from_row_errors_action() {
        let schema = CanonicalSchema {
            name: "orders".into(),
            version: 1,
            description: None,
            columns: vec![ColumnDefinition::new("order_id", DataType::String).required().with_validators(vec![Validator::Unique { message: None }])],
            error_policy: ErrorPolicy::RejectRow,
            strict: false,
        };
        let columns = vec!["order_id".to_string()];
        let rows = vec![vec!["ORD-1".to_string()], vec!["ORD-1".to_string()]];
        let mappings = identity_mapping(&["order_id"]);

        let result = compute(&columns, &rows, &mappings, Some(&schema)).unwrap();
        assert_eq!(result.row_errors[0].action, RowAction::Rejected);
    }

    #[tokio::test]
    async fn run_purges_prior_entries_before_reappending() {
        let journal = MemoryJournal::default();
        let schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
        let columns = vec!["order_id".to_string()];
        let rows = vec![vec!["ORD-1".to_string()]];
        let mappings = identity_mapping(&["order_id"]);

        run("i1", &columns, &rows, &mappings, Some(&schema), &journal).await.unwrap();
        run("i1", &columns, &rows, &mappings, Some(&schema), &journal).await.unwrap();

        let entries = journal.list_stage("i1", Stage::Validate).await.unwrap();
        assert_eq!(entries.len(), 1);
    }
}
