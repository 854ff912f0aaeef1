//! Small supporting types for the public operations.

/// The two artifact formats `fetchOutput` can return.
/// Key construction is left to `ingest_pipeline::output::OutputKeys`, the
/// single source of truth for the deterministic artifact layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}
