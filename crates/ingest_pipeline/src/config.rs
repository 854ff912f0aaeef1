//! Tunables for the pipeline. Kept as a plain struct
//! loaded by the binary crate rather than baked into the stages, so tests
//! can exercise non-default thresholds without touching the environment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cap on sample rows retained by parse for infer/map to consume
    /// without a second full pass.
    pub inference_sample_size: usize,
    /// Confidence below which a mapping needs an alternatives list and,
    /// if also above 0, counts as ambiguous.
    pub mapping_confidence_threshold: f64,
    /// Fuzzy-match floor; similarity below this never yields a candidate.
    pub fuzzy_similarity_floor: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inference_sample_size: 1000,
            mapping_confidence_threshold: 0.8,
            fuzzy_similarity_floor: 0.5,
        }
    }
}
