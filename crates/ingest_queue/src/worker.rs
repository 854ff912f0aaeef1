//! Per-queue worker pool: bounded concurrency and exponential-backoff retry.

use crate::model::{Job, QueueName};
use crate::store::JobQueue;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: i64,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Every queue retries its stage up to 3 times with exponential
    /// backoff, base 1 second.
    pub fn default_for(queue: QueueName) -> Self {
        let max_attempts = match queue {
            QueueName::Parse | QueueName::Infer | QueueName::Map => 3,
            QueueName::Validate | QueueName::Output => 3,
        };
        Self { max_attempts, base_backoff: Duration::from_secs(1) }
    }

    fn delay_for_attempt(&self, attempt: i64) -> Duration {
        let exponent = (attempt - 1).max(0) as u32;
        self.base_backoff * 2u32.saturating_pow(exponent)
    }
}

/// Outcome a stage handler reports back to the worker pool for a single job.
pub enum HandlerOutcome {
    /// Stage ran to completion; the job is done.
    Completed,
    /// Stage-fatal error; retry under the queue's backoff policy, or fail
    /// permanently once attempts are exhausted.
    Failed(String),
}

/// Polls `queue`, running up to `concurrency` jobs at once, passing each
/// claimed job to `handler`. Polling stops when `poll_interval` elapses with
/// no job claimed and is retried on the next tick — this loop is intended to
/// run for the lifetime of a worker process.
pub async fn run_worker_pool<F, Fut>(
    jobs: Arc<JobQueue>,
    queue: QueueName,
    concurrency: usize,
    poll_interval: Duration,
    retry: RetryPolicy,
    handler: F,
) where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let handler = Arc::new(handler);

    loop {
        match jobs.pop_job(queue).await {
            Ok(Some(job)) => {
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                let jobs = jobs.clone();
                let handler = handler.clone();
                let job_id = job.job_id.clone();
                let attempts = job.attempts;
                let row_id = job.row_id;

                tokio::spawn(async move {
                    let _permit = permit;
                    match handler(job).await {
                        HandlerOutcome::Completed => {
                            if let Err(e) = jobs.complete_job(row_id).await {
                                warn!("failed to mark job {job_id} completed: {e}");
                            }
                        }
                        HandlerOutcome::Failed(err) => {
                            if attempts >= retry.max_attempts {
                                warn!("job {job_id} exhausted retries: {err}");
                                if let Err(e) = jobs.fail_job(row_id, &err).await {
                                    warn!("failed to mark job {job_id} failed: {e}");
                                }
                            } else {
                                let delay = retry.delay_for_attempt(attempts);
                                let available_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                                info!("job {job_id} failed (attempt {attempts}), retrying in {delay:?}: {err}");
                                if let Err(e) = jobs.requeue_at(row_id, available_at, &err).await {
                                    warn!("failed to requeue job {job_id}: {e}");
                                }
                            }
                        }
                    }
                });
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(e) => {
                warn!("queue poll error on {queue}: {e}");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_each_attempt() {
        let policy = RetryPolicy { max_attempts: 3, base_backoff: Duration::from_secs(1) };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
    }
}
