//! Command-line surface:
//! this binary drives the same orchestrator operations a thin API layer
//! would, for local exercising of the pipeline.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ingestctl", about = "Drive the CSV ingestion pipeline end to end", version)]
pub struct Cli {
    /// Root directory for the SQLite database and blob store. Defaults to
    /// `~/.ingest_core`.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Emit verbose tracing to stderr as well as the rolling log file.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a canonical schema from a JSON file.
    SchemaCreate {
        /// Path to a JSON-encoded `CanonicalSchema`.
        path: PathBuf,
    },
    /// Start ingesting a CSV file, optionally bound to a schema.
    Ingest {
        /// Path to the CSV file to ingest.
        path: PathBuf,
        /// Id of a previously registered schema.
        #[arg(long)]
        schema: Option<String>,
    },
    /// Print an ingestion's current status and stage results.
    Status {
        ingestion_id: String,
    },
    /// List the decision journal for an ingestion.
    Decisions {
        ingestion_id: String,
    },
    /// Supply human mapping decisions for a suspended ingestion.
    Resume {
        ingestion_id: String,
        /// One or more `source=target` pairs; use `source=` to leave it
        /// explicitly unmapped.
        #[arg(long = "decision", value_name = "SOURCE=TARGET")]
        decisions: Vec<String>,
    },
    /// Fetch a completed ingestion's output artifact.
    Output {
        ingestion_id: String,
        #[arg(long, default_value = "csv")]
        format: OutputFormatArg,
        /// Write to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the five worker pools until interrupted, processing queued jobs.
    Worker,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum OutputFormatArg {
    Csv,
    Json,
}

impl From<OutputFormatArg> for ingest_orchestrator::OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Csv => ingest_orchestrator::OutputFormat::Csv,
            OutputFormatArg::Json => ingest_orchestrator::OutputFormat::Json,
        }
    }
}
