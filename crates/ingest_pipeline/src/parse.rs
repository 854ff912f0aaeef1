//! Parse stage: delimiter detection, relaxed-width row parsing,
//! sampling for downstream stages.

use crate::error::Result;
use ingest_journal::{DecisionEntry, Journal, Stage};
use serde::{Deserialize, Serialize};
use serde_json::json;

const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];
const SNIFF_WINDOW: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseRowError {
    pub row_number: usize,
    pub message: String,
}

/// Result of the parse stage. `rows` holds up to
/// `inferenceSampleSize` full row samples, positional by `columns`; the
/// full file is re-read by validate and output rather than cached here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_row_count: usize,
    pub parse_errors: Vec<ParseRowError>,
    pub detected_delimiter: char,
}

/// Count each delimiter candidate's occurrences on the first line of the
/// sniff window and pick the max, defaulting to `,`.
pub fn detect_delimiter(raw: &[u8]) -> char {
    let window = &raw[..raw.len().min(SNIFF_WINDOW)];
    let first_line = window.split(|&b| b == b'\n').next().unwrap_or(window);
    let text = String::from_utf8_lossy(first_line);

    let mut best = ',';
    let mut best_count = 0usize;
    for &candidate in &DELIMITER_CANDIDATES {
        let count = text.chars().filter(|&c| c == candidate).count();
        if count > best_count {
            best_count = count;
            best = candidate;
        }
    }
    if best_count == 0 {
        ','
    } else {
        best
    }
}

fn parse_raw(raw: &[u8], sample_size: usize) -> Result<ParseOutput> {
    let delimiter = detect_delimiter(raw);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(raw);

    let columns: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut parse_errors = Vec::new();
    let mut total_row_count = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                total_row_count += 1;
                parse_errors.push(ParseRowError { row_number: total_row_count, message: e.to_string() });
                continue;
            }
        };

        // Blank lines are skipped, not counted as data rows.
        if record.len() <= 1 && record.iter().all(|f| f.is_empty()) {
            continue;
        }

        total_row_count += 1;

        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if row.len() < width {
            row.resize(width, String::new());
        } else if row.len() > width {
            row.truncate(width);
        }

        if rows.len() < sample_size {
            rows.push(row);
        }
    }

    Ok(ParseOutput { columns, rows, total_row_count, parse_errors, detected_delimiter: delimiter })
}

/// Run the parse stage for `ingestion_id`, purging any prior `parse`
/// journal entries before appending fresh ones.
pub async fn run(
    ingestion_id: &str,
    raw: &[u8],
    sample_size: usize,
    journal: &dyn Journal,
) -> Result<ParseOutput> {
    let output = parse_raw(raw, sample_size)?;

    journal.purge_stage(ingestion_id, Stage::Parse).await?;
    journal
        .append(DecisionEntry::new(
            ingestion_id,
            Stage::Parse,
            "parse_complete",
            json!({
                "columnCount": output.columns.len(),
                "rowCount": output.total_row_count,
                "errorCount": output.parse_errors.len(),
                "delimiter": output.detected_delimiter.to_string(),
            }),
        ))
        .await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_journal::MemoryJournal;

    #[test]
    fn detects_semicolon_delimiter() {
        let raw = b"a;b;c\n1;2;3";
        assert_eq!(detect_delimiter(raw), ';');
    }

    #[test]
    fn defaults_to_comma_when_no_candidate_present() {
        assert_eq!(detect_delimiter(b"just one column header\nvalue"), ',');
    }

    #[test]
    fn pads_short_rows_and_truncates_long_rows() {
        let raw = b"a,b,c\n1,2\n3,4,5,6\n";
        let output = parse_raw(raw, 10).unwrap();
        assert_eq!(output.rows[0], vec!["1", "2", ""]);
        assert_eq!(output.rows[1], vec!["3", "4", "5"]);
        assert_eq!(output.total_row_count, 2);
    }

    #[test]
    fn skips_blank_lines() {
        let raw = b"a,b\n1,2\n\n3,4\n";
        let output = parse_raw(raw, 10).unwrap();
        assert_eq!(output.total_row_count, 2);
    }

    #[tokio::test]
    async fn run_appends_one_parse_complete_entry() {
        let journal = MemoryJournal::default();
        let raw = b"a;b;c\n1;2;3";
        let output = run("i1", raw, 1000, &journal).await.unwrap();
        assert_eq!(output.detected_delimiter, ';');

        let entries = journal.list_stage("i1", Stage::Parse).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decision_type, "parse_complete");
    }
}
