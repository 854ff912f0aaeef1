//! Output stage: re-apply coercion over the full re-parse and
//! assemble the five deterministic artifacts.

use crate::coerce::coerce_cell;
use crate::error::Result;
use chrono::Utc;
use ingest_journal::{DecisionEntry, Journal, Stage};
use ingest_protocol::{ColumnMapping, InferredSchema, RowAction, Value, ValidationResult};
use ingest_schema::CanonicalSchema;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};

/// Deterministic artifact keys for an ingestion, so a
/// retried output stage overwrites the same objects rather than growing new
/// ones.
pub struct OutputKeys {
    pub csv: String,
    pub json: String,
    pub errors: String,
    pub decisions: String,
    pub schema: String,
}

impl OutputKeys {
    pub fn for_ingestion(ingestion_id: &str) -> Self {
        Self {
            csv: format!("output/{ingestion_id}.csv"),
            json: format!("output/{ingestion_id}.json"),
            errors: format!("output/{ingestion_id}/errors.json"),
            decisions: format!("output/{ingestion_id}/decisions.json"),
            schema: format!("output/{ingestion_id}/schema.json"),
        }
    }
}

pub struct OutputArtifacts {
    pub output_columns: Vec<String>,
    pub csv_bytes: Vec<u8>,
    pub json_bytes: Vec<u8>,
    pub output_row_count: usize,
    pub rejected_row_count: usize,
}

#[derive(Serialize)]
struct OutputMetadata<'a> {
    ingestion_id: &'a str,
    schema_id: Option<&'a str>,
    schema_name: Option<&'a str>,
    schema_version: Option<u32>,
    processed_at: chrono::DateTime<Utc>,
    total_rows: usize,
    output_rows: usize,
    rejected_rows: usize,
}

fn output_columns(schema: Option<&CanonicalSchema>, mappings: &[ColumnMapping]) -> Vec<String> {
    if let Some(schema) = schema {
        schema.columns.iter().map(|c| c.name.clone()).collect()
    } else {
        mappings.iter().filter_map(|m| m.target_column.clone()).collect()
    }
}

fn reverse_index(mappings: &[ColumnMapping]) -> HashMap<&str, &str> {
    mappings
        .iter()
        .filter_map(|m| m.target_column.as_deref().map(|target| (target, m.source_column.as_str())))
        .collect()
}

/// Per-row action and the set of columns that errored, keyed by 1-indexed
/// row number: skip `rejected`, substitute defaults for `coerced`.
fn row_dispositions(validation: &ValidationResult) -> HashMap<usize, (RowAction, HashSet<&str>)> {
    validation
        .row_errors
        .iter()
        .map(|re| (re.row_number, (re.action, re.errors.iter().map(|e| e.column.as_str()).collect())))
        .collect()
}

fn build_row(
    row: &[String],
    columns: &[String],
    output_cols: &[String],
    reverse: &HashMap<&str, &str>,
    schema: Option<&CanonicalSchema>,
    action: RowAction,
    errored_columns: &HashSet<&str>,
) -> Vec<String> {
    output_cols
        .iter()
        .map(|target| {
            let Some(schema) = schema else {
                // Passthrough: copy by source name directly.
                let idx = columns.iter().position(|c| c == target);
                return idx.and_then(|i| row.get(i)).cloned().unwrap_or_default();
            };

            let Some(column_def) = schema.column(target) else {
                return String::new();
            };
            let raw = reverse
                .get(target.as_str())
                .and_then(|source| columns.iter().position(|c| c.as_str() == *source))
                .and_then(|idx| row.get(idx))
                .map(|s| s.as_str());

            let (mut value, _) = coerce_cell(raw, column_def);

            if action == RowAction::Coerced && errored_columns.contains(target.as_str()) {
                if let Some(default) = &column_def.default {
                    value = json_default_to_value(default);
                }
            }

            value.as_display_string()
        })
        .collect()
}

fn json_default_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n.as_i64().map(Value::Int).unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::Json(other.clone()),
    }
}

fn write_csv(output_cols: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(output_cols)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::error::StageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
}

/// Run the output stage: re-parse, re-coerce, assemble the canonical CSV
/// and JSON bodies. `errors_json`/`decisions_json`/`schema_json` bytes are
/// produced by the caller (orchestrator) directly from the persisted
/// `ValidationResult`, journal snapshot, and schema trio, since those are
/// plain serializations this stage doesn't need to recompute.
pub async fn run(
    ingestion_id: &str,
    schema_id: Option<&str>,
    columns: &[String],
    rows: &[Vec<String>],
    mappings: &[ColumnMapping],
    validation: &ValidationResult,
    schema: Option<&CanonicalSchema>,
    journal: &dyn Journal,
) -> Result<OutputArtifacts> {
    let output_cols = output_columns(schema, mappings);
    let reverse = reverse_index(mappings);
    let dispositions = row_dispositions(validation);
    let empty_set: HashSet<&str> = HashSet::new();

    let mut output_rows = Vec::with_capacity(rows.len());
    let mut rejected = 0usize;

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + 1;
        let (action, errored_columns) =
            dispositions.get(&row_number).map(|(a, c)| (*a, c)).unwrap_or((RowAction::Valid, &empty_set));

        if action == RowAction::Rejected {
            rejected += 1;
            continue;
        }

        output_rows.push(build_row(row, columns, &output_cols, &reverse, schema, action, errored_columns));
    }

    let csv_bytes = write_csv(&output_cols, &output_rows)?;

    let metadata = OutputMetadata {
        ingestion_id,
        schema_id,
        schema_name: schema.map(|s| s.name.as_str()),
        schema_version: schema.map(|s| s.version),
        processed_at: Utc::now(),
        total_rows: rows.len(),
        output_rows: output_rows.len(),
        rejected_rows: rejected,
    };
    let json_body = json!({
        "metadata": metadata,
        "columns": output_cols,
        "data": output_rows,
    });
    let json_bytes = serde_json::to_vec_pretty(&json_body)?;

    journal.purge_stage(ingestion_id, Stage::Output).await?;
    journal
        .append(DecisionEntry::new(
            ingestion_id,
            Stage::Output,
            "output_complete",
            json!({
                "outputRows": output_rows.len(),
                "rejectedRows": rejected,
            }),
        ))
        .await?;

    Ok(OutputArtifacts {
        output_columns: output_cols,
        csv_bytes,
        json_bytes,
        output_row_count: output_rows.len(),
        rejected_row_count: rejected,
    })
}

/// Helper used when no schema exists and `InferredSchema` needs the same
/// artifact assembly as a terminal mapping (kept separate from `run` so
/// the passthrough case doesn't need a dummy `CanonicalSchema`).
pub fn schema_snapshot_json(
    schema: Option<&CanonicalSchema>,
    inferred: &InferredSchema,
    mappings: &[ColumnMapping],
) -> Result<Vec<u8>> {
    let body = json!({
        "canonicalSchema": schema,
        "inferredSchema": inferred,
        "mappings": mappings,
    });
    Ok(serde_json::to_vec_pretty(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_journal::MemoryJournal;
    use ingest_protocol::{DataType, MappingMethod, RowError};
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

    #[tokio::test]
    async fn reject_policy_excludes_row_from_csv() {
        let journal = MemoryJournal::default();
        let schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
        let columns = vec!["order_id".to_string()];
        let rows = vec![vec!["ORD-1".to_string()], vec!["ORD-2".to_string()]];
        let mappings = identity_mapping(&["order_id"]);
        let validation = ValidationResult {
            valid_row_count: 1,
            invalid_row_count: 1,
            row_errors: vec![RowError { row_number: 2, action: RowAction::Rejected, errors: vec![] }],
            errors_by_column: HashMap::new(),
        };

        let artifacts = run("i1", None, &columns, &rows, &mappings, &validation, Some(&schema), &journal).await.unwrap();
        assert_eq!(artifacts.output_row_count, 1);
        assert_eq!(artifacts.rejected_row_count, 1);

        let csv_text = String::from_utf8(artifacts.csv_bytes).unwrap();
        assert!(!csv_text.contains("ORD-2"));
    }

    #[tokio::test]
    async fn output_emits_single_output_complete_entry() {
        let journal = MemoryJournal::default();
        let schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
        let columns = vec!["order_id".to_string()];
        let rows = vec![vec!["ORD-1".to_string()]];
        let mappings = identity_mapping(&["order_id"]);
        let validation = ValidationResult::default();

        run("i1", None, &columns, &rows, &mappings, &validation, Some(&schema), &journal).await.unwrap();
        let entries = journal.list_stage("i1", Stage::Output).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decision_type, "output_complete");
    }
}
