use fallacy_core::config::{AppConfig, EmbeddingConfig};
use fallacy_core::models::Record;
use fallacy_core::pipeline;
use fallacy_core::retrieval::RetrievalEngine;
use fallacy_core::PipelineError;

fn scenario_corpus() -> Vec<Record> {
    vec![
        Record::new(
            "all cats are mammals, therefore all mammals are cats",
            "affirming_consequent",
        ),
        Record::new("it rained because the sprinklers were on", "none"),
    ]
}

fn larger_corpus() -> Vec<Record> {
    vec![
        Record::new("everyone believes it so it must be true", "bandwagon"),
        Record::new("he is a liar so his argument is wrong", "ad_hominem"),
        Record::new("if we allow this then everything will collapse", "slippery_slope"),
        Record::new("millions of people cannot be wrong about this", "bandwagon"),
        Record::new("you are too young to have an opinion on taxes", "ad_hominem"),
        Record::new("first phones in schools, next no teachers at all", "slippery_slope"),
    ]
}

#[tokio::test]
async fn cats_query_ranks_the_cats_record_first() {
    let cfg = AppConfig::default();
    let engine = pipeline::build_engine(&cfg, &scenario_corpus()).await.unwrap();

    let top = engine.query("cats imply mammals", 1).await.unwrap();
    assert_eq!(top.results.len(), 1);
    assert_eq!(top.results[0].label, "affirming_consequent");

    let both = engine.query("cats imply mammals", 2).await.unwrap();
    assert!(both.results[0].score > both.results[1].score);
}

#[tokio::test]
async fn scores_are_non_increasing_and_bounded() {
    let cfg = AppConfig::default();
    let engine = pipeline::build_engine(&cfg, &larger_corpus()).await.unwrap();

    for query in ["people believe it", "he is wrong", "everything collapses next", ""] {
        let report = engine.query(query, 6).await.unwrap();
        assert_eq!(report.query, query);
        for pair in report.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for hit in &report.results {
            assert!((-1.0..=1.0).contains(&hit.score));
        }
    }
}

#[tokio::test]
async fn oversized_top_k_is_clamped() {
    let cfg = AppConfig::default();
    let corpus = larger_corpus();
    let engine = pipeline::build_engine(&cfg, &corpus).await.unwrap();
    let report = engine.query("wrong", 100).await.unwrap();
    assert_eq!(report.results.len(), corpus.len());
}

#[tokio::test]
async fn query_before_index_fails() {
    let cfg = AppConfig::default();
    let engine =
        RetrievalEngine::new(pipeline::build_registry(&cfg).unwrap(), &cfg.embeddings).unwrap();
    assert!(matches!(
        engine.query("cats", 1).await,
        Err(PipelineError::NotIndexed)
    ));
}

#[tokio::test]
async fn overlong_record_fails_the_whole_build() {
    let cfg = AppConfig {
        embeddings: EmbeddingConfig {
            max_input_chars: 20,
            ..EmbeddingConfig::default()
        },
        ..AppConfig::default()
    };
    let mut engine =
        RetrievalEngine::new(pipeline::build_registry(&cfg).unwrap(), &cfg.embeddings).unwrap();
    let err = engine.build_index(&scenario_corpus()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(!engine.is_indexed());
}

#[tokio::test]
async fn rebuild_replaces_the_index() {
    let cfg = AppConfig::default();
    let mut engine = pipeline::build_engine(&cfg, &larger_corpus()).await.unwrap();
    engine.build_index(&scenario_corpus()).await.unwrap();
    assert_eq!(engine.len(), 2);
    let reports = engine.query_many(&["all cats are mammals", "the sprinklers were on"], 1).await.unwrap();
    assert_eq!(reports[0].results[0].label, "affirming_consequent");
    assert_eq!(reports[1].results[0].label, "none");
}

fn with_model(provider: &str, model: &str) -> AppConfig {
    AppConfig {
        embeddings: EmbeddingConfig {
            provider: provider.into(),
            model: model.into(),
            ..EmbeddingConfig::default()
        },
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn hashing_provider_reports_its_model() {
    let engine = pipeline::build_engine(&with_model("hashing", "hashing-bow-384"), &scenario_corpus())
        .await
        .unwrap();
    assert_eq!(engine.model(), "hashing-bow-384");
}

#[tokio::test]
async fn hashing_provider_rejects_a_pretrained_model_name() {
    let cfg = with_model("hashing", "sentence-transformers/all-MiniLM-L6-v2");
    let err = pipeline::build_engine(&cfg, &scenario_corpus())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(err.to_string().contains("sentence-transformers/all-MiniLM-L6-v2"));
}

#[test]
fn onnx_provider_loads_the_configured_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = with_model("onnx", "sentence-transformers/all-MiniLM-L6-v2");
    cfg.embeddings.model_dir = dir.path().to_string_lossy().into_owned();
    let err = pipeline::build_registry(&cfg).err().unwrap();
    let msg = err.to_string();
    assert!(msg.contains("model unavailable"));
    assert!(msg.contains("all-MiniLM-L6-v2"));
    assert!(msg.contains(&dir.path().display().to_string()));
}
