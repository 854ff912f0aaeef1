//! SQL-backed `Journal` implementation against the `decision_logs` table.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_journal::{DecisionEntry, Journal, Stage};
use sqlx::{Pool, Row, Sqlite};

pub struct SqlJournal {
    pool: Pool<Sqlite>,
}

impl SqlJournal {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn stage_str(stage: Stage) -> &'static str {
    match stage {
        Stage::Parse => "parse",
        Stage::Infer => "infer",
        Stage::Map => "map",
        Stage::Validate => "validate",
        Stage::Output => "output",
    }
}

fn parse_stage(s: &str) -> Result<Stage> {
    Ok(match s {
        "parse" => Stage::Parse,
        "infer" => Stage::Infer,
        "map" => Stage::Map,
        "validate" => Stage::Validate,
        "output" => Stage::Output,
        other => return Err(crate::error::DbError::invalid_state(format!("unknown stage '{other}'"))),
    })
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<DecisionEntry> {
    let stage: String = row.try_get("stage")?;
    let details_json: String = row.try_get("details_json")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(DecisionEntry {
        ingestion_id: row.try_get("ingestion_id")?,
        stage: parse_stage(&stage)?,
        decision_type: row.try_get("decision_type")?,
        details: serde_json::from_str(&details_json)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl Journal for SqlJournal {
    async fn append(&self, entry: DecisionEntry) -> anyhow::Result<()> {
        let details_json = serde_json::to_string(&entry.details)?;
        sqlx::query(
            r#"
            INSERT INTO decision_logs (ingestion_id, stage, decision_type, details_json, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.ingestion_id)
        .bind(stage_str(entry.stage))
        .bind(&entry.decision_type)
        .bind(&details_json)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_stage(&self, ingestion_id: &str, stage: Stage) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM decision_logs WHERE ingestion_id = ? AND stage = ?")
            .bind(ingestion_id)
            .bind(stage_str(stage))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, ingestion_id: &str) -> anyhow::Result<Vec<DecisionEntry>> {
        let rows = sqlx::query("SELECT * FROM decision_logs WHERE ingestion_id = ? ORDER BY id")
            .bind(ingestion_id)
            .fetch_all(&self.pool)
            .await?;
        let entries = rows.iter().map(row_to_entry).collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    async fn list_stage(&self, ingestion_id: &str, stage: Stage) -> anyhow::Result<Vec<DecisionEntry>> {
        let rows = sqlx::query("SELECT * FROM decision_logs WHERE ingestion_id = ? AND stage = ? ORDER BY id")
            .bind(ingestion_id)
            .bind(stage_str(stage))
            .fetch_all(&self.pool)
            .await?;
        let entries = rows.iter().map(row_to_entry).collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::open_sqlite_memory_pool;
    use serde_json::json;

    #[tokio::test]
    async fn append_and_list_round_trips() {
        let pool = open_sqlite_memory_pool().await.unwrap();
        let journal = SqlJournal::new(pool);
        journal
            .append(DecisionEntry::new("i1", Stage::Parse, "parse_complete", json!({"rows": 10})))
            .await
            .unwrap();
        journal
            .append(DecisionEntry::new("i1", Stage::Infer, "type_inferred", json!({"column": "age"})))
            .await
            .unwrap();

        let all = journal.list("i1").await.unwrap();
        assert_eq!(all.len(), 2);

        let parse_only = journal.list_stage("i1", Stage::Parse).await.unwrap();
        assert_eq!(parse_only.len(), 1);
        assert_eq!(parse_only[0].decision_type, "parse_complete");
    }

    #[tokio::test]
    async fn purge_stage_removes_only_that_stage() {
        let pool = open_sqlite_memory_pool().await.unwrap();
        let journal = SqlJournal::new(pool);
        journal
            .append(DecisionEntry::new("i1", Stage::Validate, "row_rejected", json!({"row": 3})))
            .await
            .unwrap();
        journal
            .append(DecisionEntry::new("i1", Stage::Parse, "parse_complete", json!({"rows": 10})))
            .await
            .unwrap();

        journal.purge_stage("i1", Stage::Validate).await.unwrap();

        let remaining = journal.list("i1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].stage, Stage::Parse);
    }
}
