//! SQLite-backed queue storage: atomic job claiming via `UPDATE ... WHERE`,
//! the same pattern this workspace's sentinel crate uses for its processing
//! queue.

use crate::error::{QueueError, Result};
use crate::model::{Job, JobStatus, QueueName};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

/// Creates the `queue_jobs` table if it does not already exist. Callers
/// typically share a pool with `ingest_db`'s store rather than open a
/// second SQLite file.
pub async fn migrate(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue_name TEXT NOT NULL,
            job_id TEXT NOT NULL UNIQUE,
            payload_json TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            attempts INTEGER NOT NULL DEFAULT 0,
            available_at TEXT NOT NULL,
            claimed_at TEXT,
            error TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_queue_jobs_poll ON queue_jobs(queue_name, status, available_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub struct JobQueue {
    pool: Pool<Sqlite>,
}

impl JobQueue {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Enqueue a job. Idempotent on `job_id`: re-enqueueing an
    /// already-queued or already-claimed stage is a no-op, so a retried
    /// orchestrator transition never double-schedules work.
    pub async fn enqueue(&self, queue: QueueName, job_id: &str, payload: &serde_json::Value) -> Result<()> {
        let payload_json = serde_json::to_string(payload)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO queue_jobs (queue_name, job_id, payload_json, status, available_at, created_at)
            VALUES (?, ?, ?, 'queued', ?, ?)
            ON CONFLICT(job_id) DO NOTHING
            "#,
        )
        .bind(queue.as_str())
        .bind(job_id)
        .bind(&payload_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically claim the oldest available job on `queue`.
    pub async fn pop_job(&self, queue: QueueName) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let row_id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM queue_jobs
            WHERE queue_name = ? AND status = 'queued' AND available_at <= ?
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(queue.as_str())
        .bind(&now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row_id) = row_id else {
            tx.commit().await?;
            return Ok(None);
        };

        let rows_affected = sqlx::query(
            r#"
            UPDATE queue_jobs
            SET status = 'running', claimed_at = ?, attempts = attempts + 1
            WHERE id = ? AND status = 'queued'
            "#,
        )
        .bind(&now)
        .bind(row_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            // Claimed by another worker between the select and the update.
            tx.commit().await?;
            return Ok(None);
        }

        let row = sqlx::query("SELECT * FROM queue_jobs WHERE id = ?")
            .bind(row_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        let queue_name: String = row.try_get("queue_name")?;
        let job_id: String = row.try_get("job_id")?;
        let payload_json: String = row.try_get("payload_json")?;
        let attempts: i64 = row.try_get("attempts")?;

        Ok(Some(Job {
            row_id,
            queue: QueueName::parse(&queue_name).ok_or_else(|| QueueError::UnknownQueue(queue_name))?,
            job_id,
            payload: serde_json::from_str(&payload_json)?,
            attempts,
        }))
    }

    pub async fn complete_job(&self, row_id: i64) -> Result<()> {
        sqlx::query("UPDATE queue_jobs SET status = 'completed' WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark a job permanently failed (retry cap exhausted).
    pub async fn fail_job(&self, row_id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE queue_jobs SET status = 'failed', error = ? WHERE id = ?")
            .bind(error)
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Return a job to `queued`, scheduling its next attempt at `available_at`.
    pub async fn requeue_at(&self, row_id: i64, available_at: chrono::DateTime<Utc>, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE queue_jobs
            SET status = 'queued', available_at = ?, error = ?, claimed_at = NULL
            WHERE id = ?
            "#,
        )
        .bind(available_at.to_rfc3339())
        .bind(error)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus> {
        let status: String = sqlx::query_scalar("SELECT status FROM queue_jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        JobStatus::parse(&status).ok_or_else(|| QueueError::NotFound(job_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect(":memory:").await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_on_job_id() {
        let pool = setup().await;
        let queue = JobQueue::new(pool);
        queue.enqueue(QueueName::Parse, "parse-i1", &json!({"n": 1})).await.unwrap();
        queue.enqueue(QueueName::Parse, "parse-i1", &json!({"n": 2})).await.unwrap();

        let job = queue.pop_job(QueueName::Parse).await.unwrap().unwrap();
        assert_eq!(job.payload, json!({"n": 1}));
        assert!(queue.pop_job(QueueName::Parse).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pop_job_claims_and_completes() {
        let pool = setup().await;
        let queue = JobQueue::new(pool);
        queue.enqueue(QueueName::Infer, "infer-i1", &json!({})).await.unwrap();

        let job = queue.pop_job(QueueName::Infer).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        queue.complete_job(job.row_id).await.unwrap();
        assert_eq!(queue.status("infer-i1").await.unwrap(), JobStatus::Completed);
    }

    #[tokio::test]
    async fn requeue_delays_until_available_at() {
        let pool = setup().await;
        let queue = JobQueue::new(pool);
        queue.enqueue(QueueName::Map, "map-i1", &json!({})).await.unwrap();
        let job = queue.pop_job(QueueName::Map).await.unwrap().unwrap();

        let future = Utc::now() + chrono::Duration::seconds(60);
        queue.requeue_at(job.row_id, future, "transient blip").await.unwrap();

        assert!(queue.pop_job(QueueName::Map).await.unwrap().is_none());
        assert_eq!(queue.status("map-i1").await.unwrap(), JobStatus::Queued);
    }
}
