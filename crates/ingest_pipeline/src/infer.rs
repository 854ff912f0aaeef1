//! Infer stage: per-column type voting over sampled values.

use crate::error::Result;
use crate::patterns::{date_re, datetime_re, email_re, uuid_re};
use ingest_journal::{DecisionEntry, Journal, Stage};
use ingest_protocol::{DataType, InferredColumn, InferredSchema};
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::OnceLock;

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+$").unwrap())
}

fn float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d*\.\d+$|^-?\d+\.\d*$").unwrap())
}

// Excludes bare "1"/"0": those are indistinguishable from integers at
// inference time, so a digit-only column votes integer/float instead of
// boolean. Coercion is more permissive and accepts "1"/"0" once a schema
// has actually declared the column boolean.
const BOOLEAN_TRUE: [&str; 4] = ["true", "yes", "y", "on"];
const BOOLEAN_FALSE: [&str; 4] = ["false", "no", "n", "off"];

/// Classify one sample value, most-specific type first.
fn detect_type(value: &str) -> DataType {
    if uuid_re().is_match(value) {
        return DataType::Uuid;
    }
    if email_re().is_match(value) {
        return DataType::Email;
    }
    if url::Url::parse(value).map(|u| u.has_host()).unwrap_or(false) {
        return DataType::Url;
    }
    if datetime_re().is_match(value) {
        return DataType::Datetime;
    }
    if date_re().is_match(value) {
        return DataType::Date;
    }
    let lower = value.to_ascii_lowercase();
    if BOOLEAN_TRUE.contains(&lower.as_str()) || BOOLEAN_FALSE.contains(&lower.as_str()) {
        return DataType::Boolean;
    }
    if integer_re().is_match(value) {
        return DataType::Integer;
    }
    if float_re().is_match(value) {
        return DataType::Float;
    }
    if serde_json::from_str::<serde_json::Value>(value).is_ok() {
        return DataType::Json;
    }
    DataType::String
}

fn infer_column(name: &str, values: &[&str]) -> InferredColumn {
    let total_count = values.len();
    let non_null: Vec<&str> = values.iter().copied().filter(|v| !v.is_empty()).collect();
    let null_count = total_count - non_null.len();

    let mut votes: std::collections::HashMap<DataType, usize> = std::collections::HashMap::new();
    for value in &non_null {
        *votes.entry(detect_type(value)).or_insert(0) += 1;
    }

    let winner = votes.iter().max_by_key(|(_, count)| **count).map(|(t, _)| *t);

    // Type promotion: integer winner with any float vote
    // promotes the column to float and merges both counts.
    let (inferred_type, winner_votes) = match winner {
        Some(DataType::Integer) if votes.get(&DataType::Float).copied().unwrap_or(0) > 0 => {
            let merged = votes[&DataType::Integer] + votes[&DataType::Float];
            (DataType::Float, merged)
        }
        Some(t) => (t, votes[&t]),
        None => (DataType::String, 0),
    };

    let confidence = if non_null.is_empty() { 0.0 } else { winner_votes as f64 / non_null.len() as f64 };

    let distinct: HashSet<&str> = non_null.iter().copied().collect();
    let unique_ratio = if non_null.is_empty() { 0.0 } else { distinct.len() as f64 / non_null.len() as f64 };

    let mut sample_values: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for value in &non_null {
        if sample_values.len() >= 5 {
            break;
        }
        if seen.insert(*value) {
            sample_values.push(value.to_string());
        }
    }

    InferredColumn {
        name: name.to_string(),
        inferred_type,
        confidence,
        nullable: null_count > 0,
        unique_ratio,
        sample_values,
        null_count,
        total_count,
    }
}

/// Run the infer stage over parsed sample rows.
pub async fn run(
    ingestion_id: &str,
    columns: &[String],
    rows: &[Vec<String>],
    total_row_count: usize,
    parse_errors: usize,
    journal: &dyn Journal,
) -> Result<InferredSchema> {
    let inferred_columns: Vec<InferredColumn> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<&str> = rows.iter().map(|row| row.get(i).map(|s| s.as_str()).unwrap_or("")).collect();
            infer_column(name, &values)
        })
        .collect();

    let schema = InferredSchema { columns: inferred_columns, row_count: total_row_count, parse_errors };

    journal.purge_stage(ingestion_id, Stage::Infer).await?;
    journal
        .append(DecisionEntry::new(
            ingestion_id,
            Stage::Infer,
            "type_inference",
            json!({
                "columns": schema.columns.iter().map(|c| json!({
                    "name": c.name,
                    "inferredType": c.inferred_type.to_string(),
                    "confidence": c.confidence,
                })).collect::<Vec<_>>(),
            }),
        ))
        .await?;

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_journal::MemoryJournal;

    #[test]
    fn promotes_integer_column_with_one_float_to_float() {
        let values = ["1", "2", "3.5", "4"];
        let column = infer_column("amount", &values);
        assert_eq!(column.inferred_type, DataType::Float);
        assert_eq!(column.confidence, 1.0);
    }

    #[test]
    fn all_null_column_infers_string_with_zero_confidence() {
        let values = ["", "", ""];
        let column = infer_column("notes", &values);
        assert_eq!(column.inferred_type, DataType::String);
        assert_eq!(column.confidence, 0.0);
        assert!(column.nullable);
    }

    #[test]
    fn detects_uuid_before_string() {
        assert_eq!(detect_type("550e8400-e29b-41d4-a716-446655440000"), DataType::Uuid);
    }

    #[test]
    fn boolean_tokens_outrank_integer_detection() {
        assert_eq!(detect_type("yes"), DataType::Boolean);
        assert_eq!(detect_type("true"), DataType::Boolean);
    }

    #[test]
    fn bare_digit_tokens_are_not_boolean() {
        assert_eq!(detect_type("1"), DataType::Integer);
        assert_eq!(detect_type("0"), DataType::Integer);
    }

    #[tokio::test]
    async fn run_emits_one_type_inference_entry() {
        let journal = MemoryJournal::default();
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows = vec![vec!["1".to_string(), "x".to_string()], vec!["2".to_string(), "y".to_string()]];
        run("i1", &columns, &rows, 2, 0, &journal).await.unwrap();

        let entries = journal.list_stage("i1", Stage::Infer).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decision_type, "type_inference");
    }
}
