use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced synchronously to the caller of a public operation (spec
/// §7's "resume errors" and "stage-fatal" categories, as seen by the
/// operation that triggers them rather than by a background worker).
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("ingestion '{0}' not found")]
    IngestionNotFound(String),

    #[error("schema '{0}' not found")]
    SchemaNotFound(String),

    #[error("ingestion '{id}' is {status}, not awaiting_review")]
    NotAwaitingReview { id: String, status: String },

    #[error("ingestion '{0}' is not complete")]
    NotComplete(String),

    #[error("resume decisions do not cover ambiguous mapping(s): {0:?}")]
    IncompleteResume(Vec<String>),

    #[error("db error: {0}")]
    Db(#[from] ingest_db::DbError),

    #[error("queue error: {0}")]
    Queue(#[from] ingest_queue::QueueError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] ingest_pipeline::StageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
