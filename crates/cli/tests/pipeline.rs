use cli::report::{self, InspectReport};
use fallacy_core::analysis::{self, Schema};
use fallacy_core::config::{AppConfig, DataConfig};
use fallacy_core::{loader, pipeline};
use std::fs;
use tempfile::tempdir;

const DATASET: &str = r#"{"claim":"all cats are mammals, therefore all mammals are cats","fallacy":"affirming_consequent"}
{"claim":"the lawn is wet so the sprinklers must have run","fallacy":"affirming_consequent"}
{"claim":"it rained because the sprinklers were on","fallacy":"none"}
{"claim":"the bridge closed so traffic used the highway","fallacy":"none"}

"#;

#[tokio::test]
async fn test_full_pipeline() {
    // 1. Write a dataset with non-default keys
    let temp = tempdir().unwrap();
    let data_path = temp.path().join("examples.jsonl");
    fs::write(&data_path, DATASET).unwrap();

    let cfg = AppConfig {
        data: DataConfig {
            path: data_path.to_string_lossy().into_owned(),
            text_key: None,
            label_key: None,
        },
        ..AppConfig::default()
    };

    // 2. Inspect
    let examples = loader::read_examples(&cfg.data.path).unwrap();
    let schema = Schema::infer(&examples, None, None).unwrap();
    assert_eq!(schema.text_key, "claim");
    let inspect = InspectReport {
        sanity: analysis::sanity_report(&examples, &schema),
        length_stats: analysis::length_stats_by_label(&examples, &schema),
    };
    assert_eq!(inspect.sanity.num_examples, 4);
    let rendered = report::render_inspect(&inspect);
    assert!(rendered.contains("4 examples"));
    assert!(rendered.contains("affirming_consequent: 2 examples"));

    // 3. Train and evaluate on the training data
    let records = pipeline::load_records(&cfg, None).unwrap();
    assert_eq!(records.len(), 4);
    let (model, summary) = pipeline::train_and_evaluate(&cfg, &records, 0.0).unwrap();
    assert!(summary.evaluation.accuracy >= 0.5);
    let text = report::render_training(&summary, &[]);
    assert!(text.contains("accuracy on training data"));

    let predictions = model
        .classify(&["the sprinklers were on because it rained"])
        .unwrap();
    assert_eq!(predictions.predictions.len(), 1);
    let json = serde_json::to_value(&predictions).unwrap();
    assert!(json["predictions"][0]["predicted_label"].is_string());
    assert!(json["predictions"][0]["confidence"].is_number());

    // 4. Search
    let engine = pipeline::build_engine(&cfg, &records).await.unwrap();
    let result = engine.query("cats imply mammals", 10).await.unwrap();
    assert_eq!(result.results.len(), 4);
    assert_eq!(result.results[0].label, "affirming_consequent");

    let json = report::retrieval_json(
        &result,
        engine.model(),
        &["label".to_string(), "SCORE".to_string()],
    )
    .unwrap();
    assert_eq!(json["query"], "cats imply mammals");
    assert_eq!(json["model"], "hashing-bow-384");
    let first = json["results"][0].as_object().unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.contains_key("label"));
    assert!(first.contains_key("score"));
}

#[test]
fn filter_fields_keeps_everything_without_a_selection() {
    let rows = vec![serde_json::json!({"text": "a", "label": "x", "score": 0.5})];
    let out = report::filter_fields(rows.clone(), &[]);
    assert_eq!(out, rows);
}

#[test]
fn render_retrieval_lists_ranked_hits() {
    let rep = fallacy_core::models::RetrievalReport {
        query: "q".into(),
        results: vec![
            fallacy_core::models::RetrievalHit {
                text: "first".into(),
                label: "a".into(),
                score: 0.9,
            },
            fallacy_core::models::RetrievalHit {
                text: "second".into(),
                label: "b".into(),
                score: 0.1,
            },
        ],
    };
    let out = report::render_retrieval(&rep);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "query: q");
    assert_eq!(lines[1], "  1. 0.9000  [a] first");
    assert_eq!(lines[2], "  2. 0.1000  [b] second");
}
