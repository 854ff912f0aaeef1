mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use comfy_table::Table;
use ingest_db::Store;
use ingest_orchestrator::{Orchestrator, OrchestratorConfig};
use ingest_protocol::ReviewDecision;
use ingest_schema::CanonicalSchema;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    ingest_logging::init_logging(ingest_logging::LogConfig {
        app_name: "ingestctl",
        verbose: cli.verbose,
        tui_mode: false,
    })?;

    let data_dir = cli.data_dir.clone().unwrap_or_else(ingest_logging::ingest_home);
    let config = OrchestratorConfig::new(data_dir.clone());
    let orchestrator = Orchestrator::open(config).await.context("opening ingestion core")?;

    match cli.command {
        Command::SchemaCreate { path } => schema_create(&data_dir, &path).await,
        Command::Ingest { path, schema } => ingest(&orchestrator, &path, schema).await,
        Command::Status { ingestion_id } => status(&orchestrator, &ingestion_id).await,
        Command::Decisions { ingestion_id } => decisions(&orchestrator, &ingestion_id).await,
        Command::Resume { ingestion_id, decisions } => resume(&orchestrator, &ingestion_id, decisions).await,
        Command::Output { ingestion_id, format, out } => output(&orchestrator, &ingestion_id, format.into(), out).await,
        Command::Worker => worker(&orchestrator).await,
    }
}

async fn schema_create(data_dir: &PathBuf, path: &PathBuf) -> Result<()> {
    let text = tokio::fs::read_to_string(path).await.with_context(|| format!("reading {}", path.display()))?;
    let schema: CanonicalSchema = serde_json::from_str(&text).context("parsing schema JSON")?;

    let db_path = data_dir.join("ingest_core.sqlite3");
    let store = Store::open(&db_path).await.context("opening ingestion core database")?;
    let stored = store.schemas().create(schema).await.context("persisting schema")?;

    println!("created schema {} ({})", stored.id, stored.schema.name);
    Ok(())
}

async fn ingest(orchestrator: &Orchestrator, path: &PathBuf, schema: Option<String>) -> Result<()> {
    let bytes = tokio::fs::read(path).await.with_context(|| format!("reading {}", path.display()))?;
    let filename = path.file_name().map(|n| n.to_string_lossy().to_string());

    let ingestion = orchestrator.start_ingestion(&bytes, filename, schema).await?;
    println!("started ingestion {} (status: {})", ingestion.id, ingestion.status);
    Ok(())
}

async fn status(orchestrator: &Orchestrator, ingestion_id: &str) -> Result<()> {
    let ingestion = orchestrator.get_ingestion(ingestion_id).await?;

    let mut table = Table::new();
    table.set_header(vec!["field", "value"]);
    table.add_row(vec!["id".to_string(), ingestion.id]);
    table.add_row(vec!["status".to_string(), ingestion.status.to_string()]);
    table.add_row(vec!["schema_id".to_string(), ingestion.schema_id.unwrap_or_else(|| "-".to_string())]);
    table.add_row(vec!["row_count".to_string(), ingestion.row_count.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())]);
    table.add_row(vec!["valid_row_count".to_string(), ingestion.valid_row_count.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())]);
    if let Some(ambiguous) = ingestion.mapping_result.as_ref().filter(|m| m.requires_review) {
        table.add_row(vec!["ambiguous_mappings".to_string(), ambiguous.ambiguous_mappings.join(", ")]);
    }
    if let Some(error) = ingestion.error {
        table.add_row(vec!["error".to_string(), error]);
    }
    println!("{table}");
    Ok(())
}

async fn decisions(orchestrator: &Orchestrator, ingestion_id: &str) -> Result<()> {
    let entries = orchestrator.list_decisions(ingestion_id).await?;

    let mut table = Table::new();
    table.set_header(vec!["stage", "decision_type", "created_at", "details"]);
    for entry in entries {
        table.add_row(vec![
            entry.stage.to_string(),
            entry.decision_type,
            entry.created_at.to_rfc3339(),
            entry.details.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn resume(orchestrator: &Orchestrator, ingestion_id: &str, raw_decisions: Vec<String>) -> Result<()> {
    let decisions = raw_decisions
        .iter()
        .map(|pair| parse_decision(pair))
        .collect::<Result<Vec<_>>>()?;

    orchestrator.resume_review(ingestion_id, decisions).await?;
    println!("resumed ingestion {ingestion_id}");
    Ok(())
}

fn parse_decision(pair: &str) -> Result<ReviewDecision> {
    let Some((source, target)) = pair.split_once('=') else {
        bail!("expected SOURCE=TARGET, got '{pair}'");
    };
    let target_column = if target.is_empty() { None } else { Some(target.to_string()) };
    Ok(ReviewDecision { source_column: source.to_string(), target_column })
}

async fn output(orchestrator: &Orchestrator, ingestion_id: &str, format: ingest_orchestrator::OutputFormat, out: Option<PathBuf>) -> Result<()> {
    let bytes = orchestrator.fetch_output(ingestion_id, format).await?;
    match out {
        Some(path) => {
            tokio::fs::write(&path, &bytes).await.with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}

async fn worker(orchestrator: &Orchestrator) -> Result<()> {
    tracing::info!("starting worker pools");
    let handles = orchestrator.spawn_workers();
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down worker pools");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}
