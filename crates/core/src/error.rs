//! Error taxonomy shared by the loader, classifier and retrieval engine.

use providers::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("need at least two distinct labels to fit, found {distinct_labels}")]
    InsufficientData { distinct_labels: usize },
    #[error("classifier has not been fitted")]
    NotFitted,
    #[error("retrieval index has not been built")]
    NotIndexed,
    #[error("top_k must be a positive integer, got {0}")]
    InvalidTopK(usize),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        PipelineError::Embedding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
