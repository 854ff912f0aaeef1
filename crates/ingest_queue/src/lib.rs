//! Durable job queue consumed by the ingestion core: `enqueue`
//! with `jobId` idempotency keys, five per-stage queues with independent
//! concurrency bounds, and retry with exponential backoff.

pub mod error;
pub mod model;
pub mod store;
pub mod worker;

pub use error::{QueueError, Result};
pub use model::{resume_job_id, stage_job_id, Job, JobStatus, QueueName};
pub use store::JobQueue;
pub use worker::{run_worker_pool, HandlerOutcome, RetryPolicy};
