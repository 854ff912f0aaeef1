use serde::{Deserialize, Serialize};
use std::fmt;

/// Ingestion lifecycle status. Advances monotonically along
/// the declared sequence, with the sole branch into/out of
/// `awaiting_review`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Pending,
    Parsing,
    Inferring,
    Mapping,
    AwaitingReview,
    Validating,
    Outputting,
    Complete,
    Failed,
}

impl IngestionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, IngestionStatus::Complete | IngestionStatus::Failed)
    }
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Parsing => "parsing",
            IngestionStatus::Inferring => "inferring",
            IngestionStatus::Mapping => "mapping",
            IngestionStatus::AwaitingReview => "awaiting_review",
            IngestionStatus::Validating => "validating",
            IngestionStatus::Outputting => "outputting",
            IngestionStatus::Complete => "complete",
            IngestionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
