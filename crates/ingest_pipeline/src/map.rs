//! Map stage: four-strategy column matching with greedy target
//! consumption, ambiguity detection, and the human-review resume path.

use crate::config::PipelineConfig;
use crate::error::Result;
use ingest_journal::{DecisionEntry, Journal, Stage};
use ingest_protocol::{
    ColumnMapping, InferredSchema, MappingCandidate, MappingMethod, MappingResult, ReviewDecision,
};
use ingest_schema::CanonicalSchema;
use serde_json::json;

fn normalize(s: &str) -> String {
    s.to_ascii_lowercase().chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Split a column name on non-alphanumeric boundaries, so a compound target
/// like "order_id" also offers "order" and "id" as match candidates.
fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_ascii_alphanumeric()).filter(|t| !t.is_empty()).map(normalize).collect()
}

/// Whole-name similarity, maxed against similarity to each of `b`'s tokens.
/// A short abbreviation like "ID" scores poorly against "order_id" as a
/// whole string but matches its "id" token exactly.
fn similarity(a: &str, b: &str) -> f64 {
    let whole = strsim::sorensen_dice(&normalize(a), &normalize(b));
    let per_token = tokens(b).iter().map(|tok| strsim::sorensen_dice(&normalize(a), tok)).fold(0.0_f64, f64::max);
    whole.max(per_token)
}

struct Target<'a> {
    name: &'a str,
    aliases: &'a [String],
}

/// Identity mapping used when no schema is declared.
fn passthrough(inferred: &InferredSchema) -> MappingResult {
    let mappings = inferred
        .columns
        .iter()
        .map(|c| ColumnMapping {
            source_column: c.name.clone(),
            target_column: Some(c.name.clone()),
            method: MappingMethod::Exact,
            confidence: 1.0,
            alternative_mappings: Vec::new(),
        })
        .collect();
    MappingResult { mappings, requires_review: false, ambiguous_mappings: Vec::new() }
}

/// Find the first strategy (in precedence order) that yields a candidate
/// from `pool`, returning its index in `pool`, the method, and confidence.
fn best_match(source: &str, pool: &[Target]) -> Option<(usize, MappingMethod, f64)> {
    // 1. Exact
    if let Some(idx) = pool.iter().position(|t| t.name == source) {
        return Some((idx, MappingMethod::Exact, 1.0));
    }
    // 2. Case-insensitive
    let source_lower = source.to_ascii_lowercase();
    if let Some(idx) = pool.iter().position(|t| t.name.to_ascii_lowercase() == source_lower) {
        return Some((idx, MappingMethod::CaseInsensitive, 0.95));
    }
    // 3. Alias (case-insensitive or normalized)
    let source_norm = normalize(source);
    if let Some(idx) = pool.iter().position(|t| {
        t.aliases
            .iter()
            .any(|alias| alias.to_ascii_lowercase() == source_lower || normalize(alias) == source_norm)
    }) {
        return Some((idx, MappingMethod::Alias, 0.9));
    }
    // 4. Fuzzy: best remaining candidate by similarity, however weak. An
    // unfilled target slot always gets the pipeline's closest guess;
    // `is_ambiguous` is what sends a weak guess back for human review.
    // `Unmapped` is reserved for the case where the pool has already been
    // exhausted by earlier source columns.
    if pool.is_empty() {
        return None;
    }
    let (idx, sim) = pool
        .iter()
        .enumerate()
        .map(|(idx, target)| {
            let mut sim = similarity(source, target.name);
            for alias in target.aliases {
                sim = sim.max(similarity(source, alias));
            }
            (idx, sim)
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .expect("pool checked non-empty above");
    Some((idx, MappingMethod::Fuzzy, sim))
}

/// Alternatives against the targets still available after removing the
/// chosen one: top 3 descending, floor `config.fuzzy_similarity_floor`.
fn alternatives(source: &str, pool: &[Target], floor: f64) -> Vec<MappingCandidate> {
    let mut candidates: Vec<MappingCandidate> = pool
        .iter()
        .filter_map(|target| {
            let mut sim = similarity(source, target.name);
            for alias in target.aliases {
                sim = sim.max(similarity(source, alias));
            }
            (sim >= floor).then(|| MappingCandidate {
                target_column: target.name.to_string(),
                method: MappingMethod::Fuzzy,
                confidence: sim,
            })
        })
        .collect();
    candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    candidates.truncate(3);
    candidates
}

/// Match inferred source columns to schema columns. Greedy:
/// once a target is bound it's removed from the candidate pool.
pub fn match_columns(inferred: &InferredSchema, schema: Option<&CanonicalSchema>, config: &PipelineConfig) -> MappingResult {
    let Some(schema) = schema else {
        return passthrough(inferred);
    };

    let mut pool: Vec<Target> = schema.columns.iter().map(|c| Target { name: &c.name, aliases: &c.aliases }).collect();

    let mut mappings = Vec::with_capacity(inferred.columns.len());
    for column in &inferred.columns {
        let source = column.name.as_str();
        match best_match(source, &pool) {
            Some((idx, method, confidence)) => {
                let target = pool.remove(idx);
                let target_name = target.name.to_string();
                let alts = if confidence < config.mapping_confidence_threshold {
                    alternatives(source, &pool, config.fuzzy_similarity_floor)
                } else {
                    Vec::new()
                };
                mappings.push(ColumnMapping {
                    source_column: source.to_string(),
                    target_column: Some(target_name),
                    method,
                    confidence,
                    alternative_mappings: alts,
                });
            }
            None => {
                mappings.push(ColumnMapping {
                    source_column: source.to_string(),
                    target_column: None,
                    method: MappingMethod::Unmapped,
                    confidence: 0.0,
                    alternative_mappings: Vec::new(),
                });
            }
        }
    }

    finish(mappings, schema.strict, config)
}

fn finish(mappings: Vec<ColumnMapping>, strict: bool, config: &PipelineConfig) -> MappingResult {
    let ambiguous_mappings: Vec<String> = mappings
        .iter()
        .filter(|m| m.is_ambiguous(config.mapping_confidence_threshold, strict))
        .map(|m| m.source_column.clone())
        .collect();
    let requires_review = !ambiguous_mappings.is_empty();
    MappingResult { mappings, requires_review, ambiguous_mappings }
}

/// Apply human decisions from a resume: replace each
/// named source column's mapping with the decision, method `manual`,
/// confidence 1.0, alternatives cleared. Recomputes `requiresReview`.
pub fn apply_resume_decisions(
    result: &mut MappingResult,
    decisions: &[ReviewDecision],
    strict: bool,
    config: &PipelineConfig,
) {
    for decision in decisions {
        if let Some(mapping) = result.mappings.iter_mut().find(|m| m.source_column == decision.source_column) {
            mapping.target_column = decision.target_column.clone();
            mapping.method = MappingMethod::Manual;
            mapping.confidence = 1.0;
            mapping.alternative_mappings.clear();
        }
    }
    let updated = finish(result.mappings.drain(..).collect(), strict, config);
    *result = updated;
}

/// Run the map stage, optionally short-circuited by a caller-supplied
/// mapping template. The pipeline never consults the template store on
/// its own; this is an explicit opt-in from the orchestrator.
pub async fn run(
    ingestion_id: &str,
    inferred: &InferredSchema,
    schema: Option<&CanonicalSchema>,
    config: &PipelineConfig,
    template: Option<Vec<ColumnMapping>>,
    journal: &dyn Journal,
) -> Result<MappingResult> {
    journal.purge_stage(ingestion_id, Stage::Map).await?;

    let result = if let Some(mappings) = template {
        let strict = schema.map(|s| s.strict).unwrap_or(false);
        finish(mappings, strict, config)
    } else if schema.is_none() {
        let result = passthrough(inferred);
        journal
            .append(DecisionEntry::new(ingestion_id, Stage::Map, "passthrough_mapping", json!({
                "columnCount": result.mappings.len(),
            })))
            .await?;
        return Ok(result);
    } else {
        match_columns(inferred, schema, config)
    };

    for mapping in &result.mappings {
        let decision_type = if mapping.target_column.is_some() { "column_mapped" } else { "column_unmapped" };
        journal
            .append(DecisionEntry::new(
                ingestion_id,
                Stage::Map,
                decision_type,
                json!({
                    "sourceColumn": mapping.source_column,
                    "targetColumn": mapping.target_column,
                    "method": mapping.method,
                    "confidence": mapping.confidence,
                    "alternatives": mapping.alternative_mappings,
                }),
            ))
            .await?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_journal::MemoryJournal;
    use ingest_protocol::{DataType, InferredColumn};
    use ingest_schema::ColumnDefinition;

    fn inferred_with(names: &[&str]) -> InferredSchema {
        InferredSchema {
            columns: names
                .iter()
                .map(|n| InferredColumn {
                    name: n.to_string(),
                    inferred_type: DataType::String,
                    confidence: 1.0,
                    nullable: false,
                    unique_ratio: 1.0,
                    sample_values: vec![],
                    null_count: 0,
                    total_count: 1,
                })
                .collect(),
            row_count: 1,
            parse_errors: 0,
        }
    }

    #[test]
    fn case_insensitive_beats_alias_by_precedence() {
        let schema = CanonicalSchema::new(
            "orders",
            1,
            vec![ColumnDefinition::new("customer_email", DataType::Email).with_aliases(["email"])],
        );
        let inferred = inferred_with(&["Email"]);
        let result = match_columns(&inferred, Some(&schema), &PipelineConfig::default());
        assert_eq!(result.mappings[0].method, MappingMethod::CaseInsensitive);
        assert_eq!(result.mappings[0].confidence, 0.95);
    }

    #[test]
    fn weak_candidate_still_maps_but_needs_review() {
        let schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
        let inferred = inferred_with(&["zzz_totally_unrelated"]);
        let result = match_columns(&inferred, Some(&schema), &PipelineConfig::default());
        assert_eq!(result.mappings[0].method, MappingMethod::Fuzzy);
        assert_eq!(result.mappings[0].target_column.as_deref(), Some("order_id"));
        assert!(result.mappings[0].confidence < PipelineConfig::default().mapping_confidence_threshold);
        assert!(result.requires_review);
    }

    #[test]
    fn exhausted_pool_leaves_extra_source_unmapped() {
        let schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
        let inferred = inferred_with(&["order_id", "extra_column"]);
        let result = match_columns(&inferred, Some(&schema), &PipelineConfig::default());
        assert_eq!(result.mappings[0].method, MappingMethod::Exact);
        assert_eq!(result.mappings[1].method, MappingMethod::Unmapped);
        assert_eq!(result.mappings[1].confidence, 0.0);
    }

    #[test]
    fn greedy_matching_consumes_targets_once() {
        let schema = CanonicalSchema::new(
            "orders",
            1,
            vec![ColumnDefinition::new("id", DataType::String), ColumnDefinition::new("Id", DataType::String)],
        );
        let inferred = inferred_with(&["id", "Id"]);
        let result = match_columns(&inferred, Some(&schema), &PipelineConfig::default());
        assert!(!result.has_duplicate_targets());
    }

    #[test]
    fn resume_decisions_clear_ambiguity() {
        let schema = CanonicalSchema::new(
            "orders",
            1,
            vec![
                ColumnDefinition::new("order_id", DataType::String),
                ColumnDefinition::new("amount", DataType::Float),
            ],
        );
        let inferred = inferred_with(&["ID", "Total"]);
        let mut result = match_columns(&inferred, Some(&schema), &PipelineConfig::default());
        assert!(result.requires_review);

        let decisions = vec![ReviewDecision { source_column: "Total".to_string(), target_column: Some("amount".to_string()) }];
        apply_resume_decisions(&mut result, &decisions, schema.strict, &PipelineConfig::default());
        assert!(!result.requires_review);
        assert_eq!(result.mappings[1].method, MappingMethod::Manual);
    }

    #[tokio::test]
    async fn no_schema_emits_single_passthrough_entry() {
        let journal = MemoryJournal::default();
        let inferred = inferred_with(&["a", "b"]);
        run("i1", &inferred, None, &PipelineConfig::default(), None, &journal).await.unwrap();
        let entries = journal.list_stage("i1", Stage::Map).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decision_type, "passthrough_mapping");
    }
}
