//! Mapping-template storage.
//!
//! The source's pipeline does not consult this automatically —
//! it's exposed as an opt-in the orchestrator can call before the map
//! stage's strategy search.

use crate::error::Result;
use ingest_protocol::ColumnMapping;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Row, Sqlite};

pub struct MappingTemplateStore {
    pool: Pool<Sqlite>,
}

impl MappingTemplateStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Hash of sorted source column names.
    pub fn fingerprint(columns: &[String]) -> String {
        let mut sorted = columns.to_vec();
        sorted.sort();
        let mut hasher = Sha256::new();
        for col in &sorted {
            hasher.update(col.as_bytes());
            hasher.update(b"\0");
        }
        format!("{:x}", hasher.finalize())
    }

    pub async fn lookup(&self, schema_id: &str, fingerprint: &str) -> Result<Option<Vec<ColumnMapping>>> {
        let row = sqlx::query(
            "SELECT mappings_json FROM mapping_templates WHERE schema_id = ? AND source_fingerprint = ?",
        )
        .bind(schema_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("mappings_json")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    pub async fn record_usage(&self, schema_id: &str, fingerprint: &str, mappings: &[ColumnMapping]) -> Result<()> {
        let json = serde_json::to_string(mappings)?;
        sqlx::query(
            r#"
            INSERT INTO mapping_templates (schema_id, source_fingerprint, mappings_json, usage_count)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(schema_id, source_fingerprint) DO UPDATE SET
                mappings_json = excluded.mappings_json,
                usage_count = usage_count + 1
            "#,
        )
        .bind(schema_id)
        .bind(fingerprint)
        .bind(&json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn usage_count(&self, schema_id: &str, fingerprint: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT usage_count FROM mapping_templates WHERE schema_id = ? AND source_fingerprint = ?",
        )
        .bind(schema_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.try_get::<i64, _>("usage_count")).transpose()?.unwrap_or(0))
    }
}
