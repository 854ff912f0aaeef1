//! The decision journal: an append-only, per-ingestion record of every
//! automated and human decision.
//!
//! The journal is the single source of truth for explainability.
//! Other logs (tracing spans emitted by the stages) are diagnostic only —
//! never rely on them for correctness or audit. This crate defines the
//! entry shape and the `Journal` trait every stage appends through; a
//! concrete SQL-backed sink lives in `ingest_db`, the way this workspace's
//! event-tape crate defines envelopes independent of where they land.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod memory;
pub use memory::MemoryJournal;

/// Which pipeline stage produced a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Infer,
    Map,
    Validate,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Parse => "parse",
            Stage::Infer => "infer",
            Stage::Map => "map",
            Stage::Validate => "validate",
            Stage::Output => "output",
        };
        write!(f, "{s}")
    }
}

/// A single append-only decision record.
///
/// `details` is a structured JSON blob specific to `decision_type` — e.g.
/// `parse_complete` carries column/row/error counts and the detected
/// delimiter, `column_mapped` carries the method/confidence/alternatives
/// for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub ingestion_id: String,
    pub stage: Stage,
    pub decision_type: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl DecisionEntry {
    pub fn new(
        ingestion_id: impl Into<String>,
        stage: Stage,
        decision_type: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            ingestion_id: ingestion_id.into(),
            stage,
            decision_type: decision_type.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

/// Sink and reader for decision journal entries.
///
/// Writes are append-only; `purge_stage` exists solely to support a stage's
/// idempotency rule on retry: remove its prior journal entries for that
/// stage before appending new ones, so a retried run never double-counts.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn append(&self, entry: DecisionEntry) -> anyhow::Result<()>;

    /// Remove all entries for `(ingestion_id, stage)`. Called by a stage
    /// immediately before it re-appends, so retried stages never
    /// double-count journal history.
    async fn purge_stage(&self, ingestion_id: &str, stage: Stage) -> anyhow::Result<()>;

    async fn list(&self, ingestion_id: &str) -> anyhow::Result<Vec<DecisionEntry>>;

    async fn list_stage(&self, ingestion_id: &str, stage: Stage) -> anyhow::Result<Vec<DecisionEntry>>;
}
