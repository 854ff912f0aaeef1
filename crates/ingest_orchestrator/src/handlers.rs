//! Per-stage job handlers. Each wraps a fallible stage body so it can report
//! `HandlerOutcome` back to `run_worker_pool`: a transient stage-fatal error
//! retries under the queue's backoff, and only once retries are exhausted
//! does the ingestion's persisted `status` flip to `failed`.

use crate::Orchestrator;
use anyhow::{anyhow, Context};
use ingest_journal::{DecisionEntry, Stage};
use ingest_pipeline::output::OutputKeys;
use ingest_pipeline::{infer, map, output, parse, validate};
use ingest_protocol::{IngestionStatus, ReviewDecision};
use ingest_queue::{stage_job_id, HandlerOutcome, Job, QueueName, RetryPolicy};
use serde_json::json;

/// Linear progression rank used only to decide whether a late-delivered job
/// has already been superseded by a further stage: a handler that observes
/// status already beyond its own exits cleanly instead of redoing work.
/// `awaiting_review` ranks with `mapping` since it is a suspended substate
/// of the same stage, not a stage past it.
fn stage_rank(status: IngestionStatus) -> u8 {
    match status {
        IngestionStatus::Pending => 0,
        IngestionStatus::Parsing => 1,
        IngestionStatus::Inferring => 2,
        IngestionStatus::Mapping | IngestionStatus::AwaitingReview => 3,
        IngestionStatus::Validating => 4,
        IngestionStatus::Outputting => 5,
        IngestionStatus::Complete | IngestionStatus::Failed => 6,
    }
}

fn payload_ingestion_id(job: &Job) -> anyhow::Result<String> {
    job.payload
        .get("ingestion_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("job {} missing ingestion_id in payload", job.job_id))
}

impl Orchestrator {
    /// Runs `body`, and on error either lets the job retry (attempts still
    /// remain) or persists `status = failed` before reporting the failure
    /// (retries exhausted).
    pub(crate) async fn run_stage(&self, job: &Job, queue: QueueName, body: impl std::future::Future<Output = anyhow::Result<()>>) -> HandlerOutcome {
        match body.await {
            Ok(()) => HandlerOutcome::Completed,
            Err(e) => {
                let policy = RetryPolicy::default_for(queue);
                if job.attempts >= policy.max_attempts {
                    if let Ok(ingestion_id) = payload_ingestion_id(job) {
                        if let Err(mark_err) = self.mark_failed(&ingestion_id, &e.to_string()).await {
                            tracing::warn!("failed to persist failure for {ingestion_id}: {mark_err}");
                        }
                    }
                }
                tracing::warn!("stage {queue} failed for job {}: {e}", job.job_id);
                HandlerOutcome::Failed(e.to_string())
            }
        }
    }

    pub(crate) async fn mark_failed(&self, ingestion_id: &str, message: &str) -> anyhow::Result<()> {
        let mut ingestion = self.db.ingestions().get(ingestion_id).await?;
        ingestion.status = IngestionStatus::Failed;
        ingestion.error = Some(message.to_string());
        self.db.ingestions().save(&mut ingestion).await?;
        Ok(())
    }

    pub(crate) async fn handle_parse(&self, job: Job) -> HandlerOutcome {
        let fut = async {
            let ingestion_id = payload_ingestion_id(&job)?;
            let mut ingestion = self.db.ingestions().get(&ingestion_id).await?;
            if stage_rank(ingestion.status) > stage_rank(IngestionStatus::Parsing) {
                return Ok(());
            }

            let raw = self.blobs.load(&ingestion.raw_file_key).await.context("loading raw blob")?;
            let journal = self.db.journal();
            let parsed = parse::run(&ingestion_id, &raw, self.config.pipeline.inference_sample_size, &journal).await?;

            let snapshot_key = format!("work/{ingestion_id}/parse.json");
            self.blobs.save(&snapshot_key, &serde_json::to_vec(&parsed)?).await?;

            ingestion.row_count = Some(parsed.total_row_count);
            ingestion.status = IngestionStatus::Inferring;
            self.db.ingestions().save(&mut ingestion).await?;

            self.queue
                .enqueue(QueueName::Infer, &stage_job_id(QueueName::Infer, &ingestion_id), &json!({"ingestion_id": ingestion_id}))
                .await?;
            Ok(())
        };
        self.run_stage(&job, QueueName::Parse, fut).await
    }

    pub(crate) async fn handle_infer(&self, job: Job) -> HandlerOutcome {
        let fut = async {
            let ingestion_id = payload_ingestion_id(&job)?;
            let mut ingestion = self.db.ingestions().get(&ingestion_id).await?;
            if stage_rank(ingestion.status) > stage_rank(IngestionStatus::Inferring) {
                return Ok(());
            }

            let snapshot_key = format!("work/{ingestion_id}/parse.json");
            let snapshot_bytes = self.blobs.load(&snapshot_key).await.context("loading parse snapshot")?;
            let parsed: parse::ParseOutput = serde_json::from_slice(&snapshot_bytes)?;

            let journal = self.db.journal();
            let inferred = infer::run(
                &ingestion_id,
                &parsed.columns,
                &parsed.rows,
                parsed.total_row_count,
                parsed.parse_errors.len(),
                &journal,
            )
            .await?;

            ingestion.inferred_schema = Some(inferred);
            ingestion.status = IngestionStatus::Mapping;
            self.db.ingestions().save(&mut ingestion).await?;

            self.queue
                .enqueue(
                    QueueName::Map,
                    &stage_job_id(QueueName::Map, &ingestion_id),
                    &json!({"ingestion_id": ingestion_id, "resume_decisions": null}),
                )
                .await?;
            Ok(())
        };
        self.run_stage(&job, QueueName::Infer, fut).await
    }

    pub(crate) async fn handle_map(&self, job: Job) -> HandlerOutcome {
        let fut = async {
            let ingestion_id = payload_ingestion_id(&job)?;
            let mut ingestion = self.db.ingestions().get(&ingestion_id).await?;
            if stage_rank(ingestion.status) > stage_rank(IngestionStatus::Mapping) {
                return Ok(());
            }

            let inferred = ingestion
                .inferred_schema
                .clone()
                .ok_or_else(|| anyhow!("ingestion {ingestion_id} reached map with no inferred schema"))?;
            let schema = match &ingestion.schema_id {
                Some(id) => Some(self.db.schemas().get(id).await?.schema),
                None => None,
            };

            let journal = self.db.journal();
            let resume_decisions: Option<Vec<ReviewDecision>> = job
                .payload
                .get("resume_decisions")
                .filter(|v| !v.is_null())
                .map(|v| serde_json::from_value(v.clone()))
                .transpose()?;

            let mapping = if let Some(decisions) = resume_decisions {
                let mut mapping = ingestion
                    .mapping_result
                    .clone()
                    .ok_or_else(|| anyhow!("ingestion {ingestion_id} resumed with no prior mapping result"))?;
                let strict = schema.as_ref().map(|s| s.strict).unwrap_or(false);
                map::apply_resume_decisions(&mut mapping, &decisions, strict, &self.config.pipeline);
                for decision in &decisions {
                    journal
                        .append(DecisionEntry::new(
                            &ingestion_id,
                            Stage::Map,
                            "human_resolved",
                            json!({
                                "sourceColumn": decision.source_column,
                                "targetColumn": decision.target_column,
                            }),
                        ))
                        .await?;
                }
                if mapping.requires_review {
                    return Err(anyhow!("ingestion {ingestion_id} still requires review after resume"));
                }
                mapping
            } else {
                map::run(&ingestion_id, &inferred, schema.as_ref(), &self.config.pipeline, None, &journal).await?
            };

            let suspend = mapping.requires_review;
            ingestion.mapping_result = Some(mapping);
            ingestion.status = if suspend { IngestionStatus::AwaitingReview } else { IngestionStatus::Validating };
            self.db.ingestions().save(&mut ingestion).await?;

            if !suspend {
                self.queue
                    .enqueue(QueueName::Validate, &stage_job_id(QueueName::Validate, &ingestion_id), &json!({"ingestion_id": ingestion_id}))
                    .await?;
            }
            Ok(())
        };
        self.run_stage(&job, QueueName::Map, fut).await
    }

    pub(crate) async fn handle_validate(&self, job: Job) -> HandlerOutcome {
        let fut = async {
            let ingestion_id = payload_ingestion_id(&job)?;
            let mut ingestion = self.db.ingestions().get(&ingestion_id).await?;
            if stage_rank(ingestion.status) > stage_rank(IngestionStatus::Validating) {
                return Ok(());
            }

            let mapping = ingestion
                .mapping_result
                .clone()
                .ok_or_else(|| anyhow!("ingestion {ingestion_id} reached validate with no mapping result"))?;
            let schema = match &ingestion.schema_id {
                Some(id) => Some(self.db.schemas().get(id).await?.schema),
                None => None,
            };

            let raw = self.blobs.load(&ingestion.raw_file_key).await.context("loading raw blob")?;
            let journal = self.db.journal();
            // Full re-parse, uncapped: validate never works off
            // the infer-stage sample.
            let full = parse::run(&ingestion_id, &raw, usize::MAX, &journal).await?;

            let validation = validate::run(&ingestion_id, &full.columns, &full.rows, &mapping.mappings, schema.as_ref(), &journal).await?;

            ingestion.valid_row_count = Some(validation.valid_row_count);
            ingestion.validation_result = Some(validation);
            ingestion.status = IngestionStatus::Outputting;
            self.db.ingestions().save(&mut ingestion).await?;

            self.queue
                .enqueue(QueueName::Output, &stage_job_id(QueueName::Output, &ingestion_id), &json!({"ingestion_id": ingestion_id}))
                .await?;
            Ok(())
        };
        self.run_stage(&job, QueueName::Validate, fut).await
    }

    pub(crate) async fn handle_output(&self, job: Job) -> HandlerOutcome {
        let fut = async {
            let ingestion_id = payload_ingestion_id(&job)?;
            let mut ingestion = self.db.ingestions().get(&ingestion_id).await?;
            if stage_rank(ingestion.status) > stage_rank(IngestionStatus::Outputting) {
                return Ok(());
            }

            let mapping = ingestion
                .mapping_result
                .clone()
                .ok_or_else(|| anyhow!("ingestion {ingestion_id} reached output with no mapping result"))?;
            let validation = ingestion
                .validation_result
                .clone()
                .ok_or_else(|| anyhow!("ingestion {ingestion_id} reached output with no validation result"))?;
            let inferred = ingestion
                .inferred_schema
                .clone()
                .ok_or_else(|| anyhow!("ingestion {ingestion_id} reached output with no inferred schema"))?;
            let schema = match &ingestion.schema_id {
                Some(id) => Some(self.db.schemas().get(id).await?.schema),
                None => None,
            };

            let raw = self.blobs.load(&ingestion.raw_file_key).await.context("loading raw blob")?;
            let journal = self.db.journal();
            let full = parse::run(&ingestion_id, &raw, usize::MAX, &journal).await?;

            let artifacts = output::run(
                &ingestion_id,
                ingestion.schema_id.as_deref(),
                &full.columns,
                &full.rows,
                &mapping.mappings,
                &validation,
                schema.as_ref(),
                &journal,
            )
            .await?;

            let keys = OutputKeys::for_ingestion(&ingestion_id);
            self.blobs.save(&keys.csv, &artifacts.csv_bytes).await?;
            self.blobs.save(&keys.json, &artifacts.json_bytes).await?;
            self.blobs.save(&keys.errors, &serde_json::to_vec_pretty(&validation)?).await?;

            let decisions = journal.list(&ingestion_id).await?;
            self.blobs.save(&keys.decisions, &serde_json::to_vec_pretty(&decisions)?).await?;

            let schema_json = output::schema_snapshot_json(schema.as_ref(), &inferred, &mapping.mappings)?;
            self.blobs.save(&keys.schema, &schema_json).await?;

            ingestion.output_file_key = Some(keys.csv.clone());
            ingestion.status = IngestionStatus::Complete;
            ingestion.completed_at = Some(chrono::Utc::now());
            self.db.ingestions().save(&mut ingestion).await?;
            Ok(())
        };
        self.run_stage(&job, QueueName::Output, fut).await
    }
}
