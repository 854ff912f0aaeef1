use serde::{Deserialize, Serialize};
use std::fmt;

/// One queue per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Parse,
    Infer,
    Map,
    Validate,
    Output,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Parse => "parse",
            QueueName::Infer => "infer",
            QueueName::Map => "map",
            QueueName::Validate => "validate",
            QueueName::Output => "output",
        }
    }

    /// Suggested per-queue concurrency bound: validate/output are
    /// memory-intensive because they rebuild the full row set.
    pub fn default_concurrency(&self) -> usize {
        match self {
            QueueName::Parse | QueueName::Infer | QueueName::Map => 5,
            QueueName::Validate | QueueName::Output => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "parse" => QueueName::Parse,
            "infer" => QueueName::Infer,
            "map" => QueueName::Map,
            "validate" => QueueName::Validate,
            "output" => QueueName::Output,
            _ => return None,
        })
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => return None,
        })
    }
}

/// A claimed job as handed to a worker. `job_id` carries the idempotency key
/// the orchestrator assigned at enqueue time: `<stage>-<ingestionId>` or
/// `<stage>-resume-<ingestionId>`.
#[derive(Debug, Clone)]
pub struct Job {
    pub row_id: i64,
    pub queue: QueueName,
    pub job_id: String,
    pub payload: serde_json::Value,
    pub attempts: i64,
}

/// Format the standard idempotency key for a fresh stage dispatch.
pub fn stage_job_id(queue: QueueName, ingestion_id: &str) -> String {
    format!("{}-{}", queue.as_str(), ingestion_id)
}

/// Format the idempotency key used when resuming a suspended ingestion.
pub fn resume_job_id(queue: QueueName, ingestion_id: &str) -> String {
    format!("{}-resume-{}", queue.as_str(), ingestion_id)
}
