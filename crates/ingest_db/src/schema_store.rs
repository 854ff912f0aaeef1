//! CRUD for canonical schemas.

use crate::error::{DbError, Result};
use chrono::Utc;
use ingest_schema::CanonicalSchema;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// A canonical schema as persisted: the store assigns the id, since
/// `CanonicalSchema` itself carries no identifier field.
#[derive(Debug, Clone)]
pub struct StoredSchema {
    pub id: String,
    pub schema: CanonicalSchema,
}

pub struct SchemaStore {
    pool: Pool<Sqlite>,
}

impl SchemaStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, schema: CanonicalSchema) -> Result<StoredSchema> {
        let id = Uuid::new_v4().to_string();
        let json = serde_json::to_string(&schema)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO schemas (id, name, version, definition_json, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&schema.name)
        .bind(schema.version as i64)
        .bind(&json)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(StoredSchema { id, schema })
    }

    pub async fn get(&self, id: &str) -> Result<StoredSchema> {
        let row = sqlx::query("SELECT id, definition_json FROM schemas WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(format!("schema '{id}' not found")))?;

        let json: String = row.try_get("definition_json")?;
        let schema: CanonicalSchema = serde_json::from_str(&json)?;
        Ok(StoredSchema { id: id.to_string(), schema })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::open_sqlite_memory_pool;
    use ingest_protocol::DataType;
    use ingest_schema::ColumnDefinition;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let pool = open_sqlite_memory_pool().await.unwrap();
        let store = SchemaStore::new(pool);
        let schema = CanonicalSchema::new(
            "orders",
            1,
            vec![ColumnDefinition::new("order_id", DataType::String).required()],
        );

        let stored = store.create(schema).await.unwrap();
        let fetched = store.get(&stored.id).await.unwrap();
        assert_eq!(fetched.schema.name, "orders");
        assert_eq!(fetched.schema.columns.len(), 1);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let pool = open_sqlite_memory_pool().await.unwrap();
        let store = SchemaStore::new(pool);
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
