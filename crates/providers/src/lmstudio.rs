//! LM Studio local server. Speaks the OpenAI embeddings protocol without auth.

use crate::openai::post_embeddings;
use crate::{EmbedResponse, EmbeddingProvider, ProviderError};
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct LmStudioConfig {
    pub base_url: String,
    pub embedding_model: String,
}

#[derive(Clone)]
pub struct LmStudioProvider {
    client: Client,
    cfg: Arc<LmStudioConfig>,
}

impl LmStudioProvider {
    pub fn new(cfg: LmStudioConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for LmStudioProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        post_embeddings(
            &self.client,
            &self.cfg.base_url,
            None,
            &self.cfg.embedding_model,
            texts,
        )
        .await
    }

    fn model(&self) -> &str {
        &self.cfg.embedding_model
    }
}
