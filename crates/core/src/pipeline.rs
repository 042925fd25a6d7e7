use crate::classifier::ClassifierPipeline;
use crate::config::AppConfig;
use crate::error::Result;
use crate::loader;
use crate::models::{Evaluation, FitSummary, Record};
use crate::retrieval::RetrievalEngine;
use providers::hashing::{HashingConfig, HashingEmbedder};
use providers::lmstudio::{LmStudioConfig, LmStudioProvider};
use providers::onnx::{OnnxConfig, OnnxEmbedder};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatedOn {
    Holdout,
    Training,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub fit: FitSummary,
    pub evaluated_on: EvaluatedOn,
    pub evaluation: Evaluation,
}

/// Register the hashing provider, the HTTP providers whose environment is set,
/// and the ONNX model when it is the configured provider.
pub fn build_registry(config: &AppConfig) -> Result<ProviderRegistry> {
    let hashing = HashingEmbedder::new(HashingConfig {
        dimension: config.embeddings.dimension,
        max_input_chars: config.embeddings.max_input_chars,
        bigrams: config.embeddings.bigrams,
    });
    let mut reg = ProviderRegistry::new().with_embedding("hashing", Arc::new(hashing));

    if let (Some(key), Some(base)) = (
        std::env::var_os("OPENAI_API_KEY"),
        std::env::var_os("OPENAI_BASE_URL"),
    ) {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: base.to_string_lossy().into_owned(),
            embedding_model: config.embeddings.model.clone(),
        });
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    if let Some(base) = std::env::var_os("LMSTUDIO_BASE_URL") {
        let provider = LmStudioProvider::new(LmStudioConfig {
            base_url: base.to_string_lossy().into_owned(),
            embedding_model: config.embeddings.model.clone(),
        });
        reg = reg.with_embedding("lmstudio", Arc::new(provider));
    }

    if config.embeddings.provider == "onnx" {
        let provider = OnnxEmbedder::load(OnnxConfig {
            model_dir: config.embeddings.model_dir.clone().into(),
            model: config.embeddings.model.clone(),
            max_input_chars: config.embeddings.max_input_chars,
        })?;
        reg = reg.with_embedding("onnx", Arc::new(provider));
    }

    info!(
        providers = ?reg.embedding_names(),
        preferred = %config.embeddings.provider,
        "embedding providers registered"
    );
    Ok(reg.set_preferred_embedding(&config.embeddings.provider))
}

/// Load the dataset at `path` (or the configured one), honouring key overrides.
pub fn load_records(config: &AppConfig, path: Option<&str>) -> Result<Vec<Record>> {
    let path = path.unwrap_or(&config.data.path);
    let records = loader::load_inferred(
        path,
        config.data.text_key.as_deref(),
        config.data.label_key.as_deref(),
    )?;
    info!(path, records = records.len(), "dataset loaded");
    Ok(records)
}

/// Fit a classifier and evaluate it on a stratified holdout, or on the
/// training data when `holdout_ratio` is 0 or leaves nothing to hold out.
pub fn train_and_evaluate(
    config: &AppConfig,
    records: &[Record],
    holdout_ratio: f64,
) -> Result<(ClassifierPipeline, TrainingSummary)> {
    let (train, holdout) = loader::stratified_split(records, holdout_ratio);
    let mut pipeline = ClassifierPipeline::from_config(config);
    let fit = pipeline.fit(&train)?;

    let (evaluated_on, evaluation) = if holdout.is_empty() {
        if holdout_ratio > 0.0 {
            warn!("holdout split is empty, evaluating on training data");
        }
        (EvaluatedOn::Training, pipeline.evaluate(&train)?)
    } else {
        (EvaluatedOn::Holdout, pipeline.evaluate(&holdout)?)
    };

    Ok((
        pipeline,
        TrainingSummary {
            fit,
            evaluated_on,
            evaluation,
        },
    ))
}

pub async fn build_engine(config: &AppConfig, records: &[Record]) -> Result<RetrievalEngine> {
    let mut engine = RetrievalEngine::new(build_registry(config)?, &config.embeddings)?;
    engine.build_index(records).await?;
    Ok(engine)
}
