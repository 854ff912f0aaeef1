//! CRUD for ingestion records.

use crate::error::{DbError, Result};
use chrono::Utc;
use ingest_protocol::Ingestion;
use sqlx::{Pool, Row, Sqlite};

pub struct IngestionStore {
    pool: Pool<Sqlite>,
}

impl IngestionStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, ingestion: &Ingestion) -> Result<()> {
        self.upsert(ingestion).await
    }

    /// Persist the full record. Every stage transition goes through this —
    /// there is no partial-field update, since at most one stage owns the
    /// record at a time.
    pub async fn save(&self, ingestion: &mut Ingestion) -> Result<()> {
        ingestion.updated_at = Utc::now();
        self.upsert(ingestion).await
    }

    async fn upsert(&self, ingestion: &Ingestion) -> Result<()> {
        let json = serde_json::to_string(ingestion)?;
        sqlx::query(
            r#"
            INSERT INTO ingestions (id, schema_id, status, record_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                schema_id = excluded.schema_id,
                status = excluded.status,
                record_json = excluded.record_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&ingestion.id)
        .bind(&ingestion.schema_id)
        .bind(ingestion.status.to_string())
        .bind(&json)
        .bind(ingestion.created_at.to_rfc3339())
        .bind(ingestion.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Ingestion> {
        let row = sqlx::query("SELECT record_json FROM ingestions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(format!("ingestion '{id}' not found")))?;
        let json: String = row.try_get("record_json")?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::open_sqlite_memory_pool;

    #[tokio::test]
    async fn create_then_get_then_update_round_trips() {
        let pool = open_sqlite_memory_pool().await.unwrap();
        let store = IngestionStore::new(pool);
        let mut ingestion = Ingestion::new("i1", "raw/i1.csv", None);
        store.create(&ingestion).await.unwrap();

        let fetched = store.get("i1").await.unwrap();
        assert_eq!(fetched.raw_file_key, "raw/i1.csv");

        ingestion.row_count = Some(42);
        store.save(&mut ingestion).await.unwrap();
        let fetched = store.get("i1").await.unwrap();
        assert_eq!(fetched.row_count, Some(42));
    }
}
