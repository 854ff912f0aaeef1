//! SQLite pool creation and schema migration.
//!
//! Mirrors this workspace's convention of hand-rolled `CREATE TABLE IF NOT
//! EXISTS` migrations run once at pool construction, rather than an
//! external migration runner — appropriate for a single-binary embedded
//! store.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub async fn open_sqlite_pool(path: &Path) -> Result<Pool<Sqlite>> {
    let url = format!("sqlite://{}", path.display());
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .disable_statement_logging();

    let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn open_sqlite_memory_pool() -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.disable_statement_logging();
    let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schemas (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            version INTEGER NOT NULL,
            definition_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestions (
            id TEXT PRIMARY KEY,
            schema_id TEXT,
            status TEXT NOT NULL,
            record_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingestions_status ON ingestions(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mapping_templates (
            schema_id TEXT NOT NULL,
            source_fingerprint TEXT NOT NULL,
            mappings_json TEXT NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (schema_id, source_fingerprint)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decision_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ingestion_id TEXT NOT NULL,
            stage TEXT NOT NULL,
            decision_type TEXT NOT NULL,
            details_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_decision_logs_ingestion ON decision_logs(ingestion_id, id)")
        .execute(pool)
        .await?;

    Ok(())
}
