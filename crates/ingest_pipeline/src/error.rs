use thiserror::Error;

pub type Result<T> = std::result::Result<T, StageError>;

/// Stage-fatal errors: these terminate the ingestion. Row- and
/// cell-scoped errors are never represented here — they're recorded into
/// the stage's result and never abort by themselves.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("raw blob is not readable: {0}")]
    UnreadableBlob(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing predecessor output: {0}")]
    MissingPredecessor(String),

    #[error("row aborted the pipeline: {0}")]
    Aborted(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("journal error: {0}")]
    Journal(#[from] anyhow::Error),
}
