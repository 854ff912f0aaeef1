use serde::{Deserialize, Serialize};

/// The strategy that produced a column mapping. Ordered by
/// descending confidence precedence: `exact ≥ case_insensitive ≥ alias ≥
/// fuzzy ≥ unmapped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    Exact,
    CaseInsensitive,
    Alias,
    Fuzzy,
    Manual,
    Unmapped,
}

/// A candidate target column with its confidence, used both as the chosen
/// mapping and as an alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingCandidate {
    pub target_column: String,
    pub method: MappingMethod,
    pub confidence: f64,
}

/// One source column's resolved mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_column: Option<String>,
    pub method: MappingMethod,
    pub confidence: f64,
    /// Up to 3, descending confidence.
    pub alternative_mappings: Vec<MappingCandidate>,
}

impl ColumnMapping {
    /// A mapping is ambiguous if it was scored below `threshold` (this
    /// covers a weak best-guess `fuzzy` match as much as any other
    /// sub-threshold method), or if the column was left entirely unmapped
    /// and the schema requires every column to resolve.
    pub fn is_ambiguous(&self, threshold: f64, strict_unmapped_requires_review: bool) -> bool {
        let scored_below_threshold = self.method != MappingMethod::Unmapped && self.confidence < threshold;
        let strict_unmapped = self.method == MappingMethod::Unmapped && strict_unmapped_requires_review;
        scored_below_threshold || strict_unmapped
    }
}

/// Output of the map stage.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MappingResult {
    pub mappings: Vec<ColumnMapping>,
    pub requires_review: bool,
    pub ambiguous_mappings: Vec<String>,
}

impl MappingResult {
    /// Invariant: no non-null target column appears twice.
    pub fn has_duplicate_targets(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for m in &self.mappings {
            if let Some(target) = &m.target_column {
                if !seen.insert(target.clone()) {
                    return true;
                }
            }
        }
        false
    }
}

/// A human decision supplied on resume for one source column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub source_column: String,
    /// `None` means the user explicitly leaves the column unmapped.
    pub target_column: Option<String>,
}
