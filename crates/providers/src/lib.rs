//! Embedding provider abstractions and registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod hashing;
pub mod lmstudio;
pub mod onnx;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("input {index} rejected: {reason}")]
    InputRejected { index: usize, reason: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed each text; the response holds one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;

    /// Identifier of the model behind this provider.
    fn model(&self) -> &str;

    /// Whether a configured model name refers to the model this provider serves.
    fn supports_model(&self, name: &str) -> bool {
        name == self.model()
    }
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    embeddings: HashMap<String, Arc<dyn EmbeddingProvider>>,
    pub preferred_embedding: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, name: &str, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_embedding(mut self, name: &str) -> Self {
        self.preferred_embedding = Some(name.to_string());
        self
    }

    pub fn embedding(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_embedding.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no embedding provider configured".into())
            })?;
        self.embeddings
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    /// Names of all registered embedding providers, sorted.
    pub fn embedding_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.embeddings.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::{HashingConfig, HashingEmbedder};

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new()
            .with_embedding(
                "hashing",
                Arc::new(HashingEmbedder::new(HashingConfig::default())),
            )
            .set_preferred_embedding("hashing")
    }

    #[test]
    fn preferred_provider_is_used_when_no_name_given() {
        let reg = registry();
        let provider = reg.embedding(None).unwrap();
        assert!(provider.model().starts_with("hashing-bow"));
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let reg = registry();
        let err = reg.embedding(Some("missing")).err().unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider(ref n) if n == "missing"));
    }

    #[test]
    fn empty_registry_reports_missing_configuration() {
        let err = ProviderRegistry::new().embedding(None).err().unwrap();
        assert_eq!(
            err.to_string(),
            "unknown provider: no embedding provider configured"
        );
    }

    #[test]
    fn names_are_sorted() {
        let reg = registry().with_embedding(
            "another",
            Arc::new(HashingEmbedder::new(HashingConfig::default())),
        );
        assert_eq!(reg.embedding_names(), vec!["another", "hashing"]);
    }
}
