//! End-to-end lifecycle tests driving the orchestrator through its real
//! SQLite store, filesystem blob store, and worker pools — no fakes, since
//! this crate's whole job is wiring those pieces together.

use ingest_orchestrator::{Orchestrator, OrchestratorConfig, OutputFormat};
use ingest_protocol::{IngestionStatus, ReviewDecision};
use ingest_schema::{CanonicalSchema, ColumnDefinition};
use ingest_protocol::DataType;
use std::time::Duration;
use tokio::time::{sleep, timeout};

async fn wait_for_status(orchestrator: &Orchestrator, id: &str, target: IngestionStatus) -> ingest_protocol::Ingestion {
    timeout(Duration::from_secs(10), async {
        loop {
            let ingestion = orchestrator.get_ingestion(id).await.unwrap();
            if ingestion.status == target || ingestion.status == IngestionStatus::Failed {
                return ingestion;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("ingestion did not reach target status in time")
}

#[tokio::test]
async fn passthrough_ingestion_completes_without_schema() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig::new(dir.path());
    let orchestrator = Orchestrator::open(config).await.unwrap();
    let handles = orchestrator.spawn_workers();

    let csv = b"order_id,amount\nORD-1,9.5\nORD-2,3.25\n";
    let ingestion = orchestrator.start_ingestion(csv, Some("orders.csv".to_string()), None).await.unwrap();

    let finished = wait_for_status(&orchestrator, &ingestion.id, IngestionStatus::Complete).await;
    assert_eq!(finished.status, IngestionStatus::Complete);
    assert_eq!(finished.row_count, Some(2));

    let output = orchestrator.fetch_output(&ingestion.id, OutputFormat::Csv).await.unwrap();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("ORD-1"));
    assert!(text.contains("ORD-2"));

    for handle in handles {
        handle.abort();
    }
}

#[tokio::test]
async fn strict_schema_suspends_on_unmapped_column_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig::new(dir.path());
    let orchestrator = Orchestrator::open(config).await.unwrap();
    let handles = orchestrator.spawn_workers();

    let mut schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
    schema.strict = true;

    // The orchestrator doesn't expose a schema-registration operation of its
    // own — tests
    // and `ingestctl` alike persist schemas through `ingest_db::Store`
    // directly, against the same SQLite file the orchestrator opened.
    let schema_id = {
        let store = ingest_db::Store::open(&config_db_path(dir.path())).await.unwrap();
        store.schemas().create(schema).await.unwrap().id
    };

    let csv = b"zzz_completely_unrelated_header\nORD-1\n";
    let ingestion = orchestrator.start_ingestion(csv, None, Some(schema_id)).await.unwrap();

    let suspended = wait_for_status(&orchestrator, &ingestion.id, IngestionStatus::AwaitingReview).await;
    assert_eq!(suspended.status, IngestionStatus::AwaitingReview);
    let mapping = suspended.mapping_result.expect("mapping result persisted before suspend");
    assert_eq!(mapping.ambiguous_mappings, vec!["zzz_completely_unrelated_header".to_string()]);

    orchestrator
        .resume_review(
            &ingestion.id,
            vec![ReviewDecision {
                source_column: "zzz_completely_unrelated_header".to_string(),
                target_column: Some("order_id".to_string()),
            }],
        )
        .await
        .unwrap();

    let finished = wait_for_status(&orchestrator, &ingestion.id, IngestionStatus::Complete).await;
    assert_eq!(finished.status, IngestionStatus::Complete);

    let output = orchestrator.fetch_output(&ingestion.id, OutputFormat::Csv).await.unwrap();
    assert!(String::from_utf8(output).unwrap().contains("ORD-1"));

    for handle in handles {
        handle.abort();
    }
}

#[tokio::test]
async fn resume_with_incomplete_decisions_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig::new(dir.path());
    let orchestrator = Orchestrator::open(config).await.unwrap();
    let handles = orchestrator.spawn_workers();

    let mut schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
    schema.strict = true;
    let schema_id = {
        let store = ingest_db::Store::open(&config_db_path(dir.path())).await.unwrap();
        store.schemas().create(schema).await.unwrap().id
    };

    let csv = b"zzz_completely_unrelated_header\nORD-1\n";
    let ingestion = orchestrator.start_ingestion(csv, None, Some(schema_id)).await.unwrap();
    wait_for_status(&orchestrator, &ingestion.id, IngestionStatus::AwaitingReview).await;

    let err = orchestrator.resume_review(&ingestion.id, vec![]).await.unwrap_err();
    assert!(matches!(err, ingest_orchestrator::OrchestratorError::IncompleteResume(_)));

    for handle in handles {
        handle.abort();
    }
}

fn config_db_path(data_dir: &std::path::Path) -> std::path::PathBuf {
    data_dir.join("ingest_core.sqlite3")
}
