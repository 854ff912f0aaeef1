//! End-to-end scenarios strung through all five stages in-process, driven
//! directly against an in-memory journal rather than the real queue.

use ingest_journal::MemoryJournal;
use ingest_pipeline::{config::PipelineConfig, infer, map, output, parse, validate};
use ingest_protocol::ReviewDecision;
use ingest_schema::{CanonicalSchema, ColumnDefinition, ErrorPolicy};
use ingest_protocol::DataType;

async fn run_pipeline(
    raw: &[u8],
    schema: Option<&CanonicalSchema>,
    config: &PipelineConfig,
    journal: &MemoryJournal,
    resume_decisions: Option<Vec<ReviewDecision>>,
) -> (parse::ParseOutput, ingest_protocol::MappingResult, ingest_protocol::ValidationResult, output::OutputArtifacts) {
    let parsed = parse::run("i1", raw, config.inference_sample_size, journal).await.unwrap();
    let inferred = infer::run("i1", &parsed.columns, &parsed.rows, parsed.total_row_count, parsed.parse_errors.len(), journal)
        .await
        .unwrap();
    let mut mapping = map::run("i1", &inferred, schema, config, None, journal).await.unwrap();

    if let Some(decisions) = resume_decisions {
        let strict = schema.map(|s| s.strict).unwrap_or(false);
        map::apply_resume_decisions(&mut mapping, &decisions, strict, config);
    }

    let validation = validate::run("i1", &parsed.columns, &parsed.rows, &mapping.mappings, schema, journal).await.unwrap();
    let artifacts = output::run("i1", None, &parsed.columns, &parsed.rows, &mapping.mappings, &validation, schema, journal)
        .await
        .unwrap();

    (parsed, mapping, validation, artifacts)
}

#[tokio::test]
async fn scenario_1_delimiter_detection() {
    let journal = MemoryJournal::default();
    let raw = b"a;b;c\n1;2;3";
    let (parsed, ..) = run_pipeline(raw, None, &PipelineConfig::default(), &journal, None).await;
    assert_eq!(parsed.detected_delimiter, ';');
    assert_eq!(parsed.columns, vec!["a", "b", "c"]);
    assert_eq!(parsed.total_row_count, 1);
}

#[tokio::test]
async fn scenario_4_human_review_cycle() {
    let schema = CanonicalSchema::new(
        "orders",
        1,
        vec![
            ColumnDefinition::new("order_id", DataType::String),
            ColumnDefinition::new("customer_email", DataType::Email),
            ColumnDefinition::new("amount", DataType::Float),
        ],
    );
    let raw = b"ID,Mail,Total\n1,a@example.com,9.99\n";

    let journal = MemoryJournal::default();
    let config = PipelineConfig::default();
    let parsed = parse::run("i1", raw, config.inference_sample_size, &journal).await.unwrap();
    let inferred =
        infer::run("i1", &parsed.columns, &parsed.rows, parsed.total_row_count, parsed.parse_errors.len(), &journal)
            .await
            .unwrap();
    let mapping = map::run("i1", &inferred, Some(&schema), &config, None, &journal).await.unwrap();
    assert!(mapping.requires_review, "Total vs amount should score below the review threshold");

    let decisions = vec![ReviewDecision { source_column: "Total".to_string(), target_column: Some("amount".to_string()) }];
    let mut resumed = mapping;
    map::apply_resume_decisions(&mut resumed, &decisions, schema.strict, &config);
    assert!(!resumed.requires_review);

    let validation =
        validate::run("i1", &parsed.columns, &parsed.rows, &resumed.mappings, Some(&schema), &journal).await.unwrap();
    let artifacts =
        output::run("i1", None, &parsed.columns, &parsed.rows, &resumed.mappings, &validation, Some(&schema), &journal)
            .await
            .unwrap();

    let csv_text = String::from_utf8(artifacts.csv_bytes).unwrap();
    let header = csv_text.lines().next().unwrap();
    assert_eq!(header, "order_id,customer_email,amount");
}

#[tokio::test]
async fn scenario_6_reject_policy_excludes_offending_rows() {
    let schema = CanonicalSchema {
        name: "orders".into(),
        version: 1,
        description: None,
        columns: vec![
            ColumnDefinition::new("order_id", DataType::String)
                .required()
                .with_validators(vec![ingest_schema::Validator::Unique { message: None }]),
            ColumnDefinition::new("status", DataType::String).with_validators(vec![ingest_schema::Validator::Enum {
                values: vec!["pending".into(), "shipped".into(), "delivered".into()],
                message: None,
            }]),
        ],
        error_policy: ErrorPolicy::RejectRow,
        strict: false,
    };
    let raw = b"order_id,status\nORD-1,pending\nORD-1,SHIPPED\nORD-2,unknown\n";

    let journal = MemoryJournal::default();
    let (_, _, validation, artifacts) = run_pipeline(raw, Some(&schema), &PipelineConfig::default(), &journal, None).await;

    assert_eq!(validation.valid_row_count, 1);
    assert_eq!(validation.invalid_row_count, 2);
    assert_eq!(artifacts.output_row_count, 1);
    assert_eq!(artifacts.rejected_row_count, 2);

    let csv_text = String::from_utf8(artifacts.csv_bytes).unwrap();
    assert!(csv_text.contains("ORD-1"));
    assert!(!csv_text.contains("ORD-2"));
}

#[tokio::test]
async fn empty_file_produces_header_only_csv_and_empty_json_data() {
    let schema = CanonicalSchema::new("orders", 1, vec![ColumnDefinition::new("order_id", DataType::String)]);
    let raw = b"order_id\n";

    let journal = MemoryJournal::default();
    let (parsed, _, validation, artifacts) =
        run_pipeline(raw, Some(&schema), &PipelineConfig::default(), &journal, None).await;

    assert_eq!(parsed.total_row_count, 0);
    assert_eq!(validation.valid_row_count, 0);
    assert_eq!(artifacts.output_row_count, 0);

    let json_body: serde_json::Value = serde_json::from_slice(&artifacts.json_bytes).unwrap();
    assert_eq!(json_body["data"].as_array().unwrap().len(), 0);
}
