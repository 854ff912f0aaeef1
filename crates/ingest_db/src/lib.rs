//! Relational store and blob store adapters consumed by the ingestion core.
//!
//! Every persisted record (schema, ingestion, mapping template, decision
//! log) is stored as an opaque JSON blob alongside whatever columns need to
//! be queryable directly — the store never understands the shape of a
//! `CanonicalSchema` or an `Ingestion`, only that it's a string to stash and
//! hand back.

pub mod blob;
pub mod error;
pub mod ingestion_store;
pub mod journal_store;
pub mod mapping_template_store;
pub mod pool;
pub mod schema_store;

pub use blob::{BlobStore, FsBlobStore};
pub use error::{DbError, Result};
pub use ingestion_store::IngestionStore;
pub use journal_store::SqlJournal;
pub use mapping_template_store::MappingTemplateStore;
pub use schema_store::{SchemaStore, StoredSchema};

use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Bundles every SQLite-backed store behind one handle, the way this
/// workspace's state-store crate bundles its backend accessors.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = pool::open_sqlite_pool(path).await?;
        Ok(Self { pool })
    }

    pub async fn open_in_memory() -> Result<Self> {
        let pool = pool::open_sqlite_memory_pool().await?;
        Ok(Self { pool })
    }

    pub fn schemas(&self) -> SchemaStore {
        SchemaStore::new(self.pool.clone())
    }

    pub fn ingestions(&self) -> IngestionStore {
        IngestionStore::new(self.pool.clone())
    }

    pub fn mapping_templates(&self) -> MappingTemplateStore {
        MappingTemplateStore::new(self.pool.clone())
    }

    pub fn journal(&self) -> SqlJournal {
        SqlJournal::new(self.pool.clone())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_accessors_share_one_pool() {
        let store = Store::open_in_memory().await.unwrap();
        let ingestions = store.ingestions();
        let ingestion = ingest_protocol::Ingestion::new("i1", "raw/i1.csv", None);
        ingestions.create(&ingestion).await.unwrap();
        assert_eq!(store.ingestions().get("i1").await.unwrap().id, "i1");
    }
}
