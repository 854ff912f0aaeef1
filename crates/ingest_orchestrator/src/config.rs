//! Tunables for the orchestrator: where state lives, and the pipeline
//! config threaded through to the infer/map stages.

use ingest_pipeline::PipelineConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root directory for the SQLite database file and the blob store.
    pub data_dir: PathBuf,
    pub pipeline: PipelineConfig,
    /// Per-queue concurrency bounds.
    pub concurrency: QueueConcurrency,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueConcurrency {
    pub parse: usize,
    pub infer: usize,
    pub map: usize,
    pub validate: usize,
    pub output: usize,
}

impl Default for QueueConcurrency {
    fn default() -> Self {
        Self { parse: 5, infer: 5, map: 5, validate: 3, output: 3 }
    }
}

impl OrchestratorConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            pipeline: PipelineConfig::default(),
            concurrency: QueueConcurrency::default(),
            poll_interval: Duration::from_millis(200),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ingest_core.sqlite3")
    }

    pub fn blob_root(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}
