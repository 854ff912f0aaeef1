//! State machine driving an ingestion through parse, infer, map, validate,
//! and output. This crate owns no pipeline logic of its own; it
//! wires `ingest_db`, `ingest_queue`, `ingest_journal`, and
//! `ingest_pipeline` together the way this workspace's sentinel crate wires
//! its scanner, store, and queue.

mod config;
mod error;
mod handlers;
mod types;

pub use config::{OrchestratorConfig, QueueConcurrency};
pub use error::{OrchestratorError, Result};
pub use types::OutputFormat;

use ingest_db::{BlobStore, DbError, FsBlobStore, Store};
use ingest_journal::DecisionEntry;
use ingest_protocol::{Ingestion, IngestionStatus, ReviewDecision};
use ingest_queue::{resume_job_id, run_worker_pool, stage_job_id, JobQueue, QueueName, RetryPolicy};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Orchestrator {
    db: Store,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<JobQueue>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Open (creating if absent) the SQLite database and blob directory
    /// under `config.data_dir`, and migrate the queue's table onto the same
    /// pool the relational stores use.
    pub async fn open(config: OrchestratorConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await.map_err(DbError::Io)?;
        let db = Store::open(&config.db_path()).await?;
        ingest_queue::store::migrate(db.pool()).await?;

        tokio::fs::create_dir_all(config.blob_root()).await.map_err(DbError::Io)?;
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.blob_root()));
        let queue = Arc::new(JobQueue::new(db.pool().clone()));

        Ok(Self { db, blobs, queue, config })
    }

    /// Register a raw upload and enqueue its first stage. The transition
    /// into `parsing` happens here, at dispatch time, not inside the parse
    /// handler.
    pub async fn start_ingestion(&self, raw_bytes: &[u8], original_filename: Option<String>, schema_id: Option<String>) -> Result<Ingestion> {
        if let Some(id) = &schema_id {
            self.db.schemas().get(id).await.map_err(|_| OrchestratorError::SchemaNotFound(id.clone()))?;
        }

        let id = Uuid::new_v4().to_string();
        let raw_key = format!("raw/{id}.csv");
        self.blobs.save(&raw_key, raw_bytes).await?;

        let mut ingestion = Ingestion::new(&id, &raw_key, schema_id);
        ingestion.original_filename = original_filename;
        ingestion.status = IngestionStatus::Parsing;
        self.db.ingestions().create(&ingestion).await?;

        self.queue
            .enqueue(QueueName::Parse, &stage_job_id(QueueName::Parse, &id), &serde_json::json!({"ingestion_id": id}))
            .await?;

        Ok(ingestion)
    }

    /// Resume a suspended ingestion with human mapping decisions (spec
    /// §4.1, §4.4). Validates preconditions synchronously and enqueues;
    /// the actual re-mapping happens in the map handler so the caller
    /// never blocks on pipeline work.
    pub async fn resume_review(&self, ingestion_id: &str, decisions: Vec<ReviewDecision>) -> Result<()> {
        let ingestion = self.db.ingestions().get(ingestion_id).await?;
        if ingestion.status != IngestionStatus::AwaitingReview {
            return Err(OrchestratorError::NotAwaitingReview { id: ingestion_id.to_string(), status: ingestion.status.to_string() });
        }

        let mapping = ingestion.mapping_result.ok_or_else(|| OrchestratorError::IncompleteResume(vec![]))?;
        let decided: std::collections::HashSet<&str> = decisions.iter().map(|d| d.source_column.as_str()).collect();
        let missing: Vec<String> = mapping.ambiguous_mappings.iter().filter(|name| !decided.contains(name.as_str())).cloned().collect();
        if !missing.is_empty() {
            return Err(OrchestratorError::IncompleteResume(missing));
        }

        self.queue
            .enqueue(
                QueueName::Map,
                &resume_job_id(QueueName::Map, ingestion_id),
                &serde_json::json!({"ingestion_id": ingestion_id, "resume_decisions": decisions}),
            )
            .await?;
        Ok(())
    }

    pub async fn get_ingestion(&self, ingestion_id: &str) -> Result<Ingestion> {
        self.db.ingestions().get(ingestion_id).await.map_err(|_| OrchestratorError::IngestionNotFound(ingestion_id.to_string()))
    }

    pub async fn list_decisions(&self, ingestion_id: &str) -> Result<Vec<DecisionEntry>> {
        Ok(self.db.journal().list(ingestion_id).await?)
    }

    /// Fetch a completed ingestion's output artifact. Errors,
    /// decisions, and schema snapshot artifacts are fetched the same way,
    /// by their deterministic keys, but `fetchOutput` itself only ever
    /// returns the primary CSV/JSON body.
    pub async fn fetch_output(&self, ingestion_id: &str, format: OutputFormat) -> Result<Vec<u8>> {
        let ingestion = self.get_ingestion(ingestion_id).await?;
        if ingestion.status != IngestionStatus::Complete {
            return Err(OrchestratorError::NotComplete(ingestion_id.to_string()));
        }
        let keys = ingest_pipeline::output::OutputKeys::for_ingestion(ingestion_id);
        let key = match format {
            OutputFormat::Csv => keys.csv,
            OutputFormat::Json => keys.json,
        };
        Ok(self.blobs.load(&key).await?)
    }

    /// Spawn the five per-queue worker pools and run them for the lifetime
    /// of the returned handle's caller: one pool per queue, each with its
    /// own concurrency bound and retry policy.
    pub fn spawn_workers(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let queues = [
            (QueueName::Parse, self.config.concurrency.parse),
            (QueueName::Infer, self.config.concurrency.infer),
            (QueueName::Map, self.config.concurrency.map),
            (QueueName::Validate, self.config.concurrency.validate),
            (QueueName::Output, self.config.concurrency.output),
        ];

        queues
            .into_iter()
            .map(|(queue_name, concurrency)| {
                let jobs = self.queue.clone();
                let poll_interval = self.config.poll_interval;
                let retry = RetryPolicy::default_for(queue_name);
                let this = self.clone();

                tokio::spawn(async move {
                    run_worker_pool(jobs, queue_name, concurrency, poll_interval, retry, move |job| {
                        let this = this.clone();
                        async move {
                            match queue_name {
                                QueueName::Parse => this.handle_parse(job).await,
                                QueueName::Infer => this.handle_infer(job).await,
                                QueueName::Map => this.handle_map(job).await,
                                QueueName::Validate => this.handle_validate(job).await,
                                QueueName::Output => this.handle_output(job).await,
                            }
                        }
                    })
                    .await
                })
            })
            .collect()
    }
}
