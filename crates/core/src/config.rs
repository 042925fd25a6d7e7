use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub vectorizer: VectorizerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: String,
    pub text_key: Option<String>,
    pub label_key: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: "data/sample_examples.jsonl".to_string(),
            text_key: None,
            label_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Upper bound on vocabulary size; the most frequent terms are kept.
    pub max_features: usize,
    /// Largest word n-gram length (1 = unigrams only).
    pub ngram_max: usize,
    /// Minimum number of documents a term must appear in.
    pub min_df: usize,
    pub sublinear_tf: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ngram_max: 1,
            min_df: 1,
            sublinear_tf: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Inverse regularisation strength.
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.5,
            max_iter: 500,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    /// Model identifier handed to the provider. It must name a model the
    /// provider can serve.
    pub model: String,
    /// Root directory for the `onnx` provider's model files.
    pub model_dir: String,
    pub batch_size: usize,
    pub dimension: usize,
    pub max_input_chars: usize,
    pub bigrams: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "hashing-bow".to_string(),
            model_dir: "models".to_string(),
            batch_size: 32,
            dimension: 384,
            max_input_chars: 2048,
            bigrams: false,
        }
    }
}

pub fn load(path: Option<&str>) -> crate::error::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
