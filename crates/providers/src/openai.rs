use crate::{EmbedResponse, EmbeddingProvider, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// POST an OpenAI-style `/v1/embeddings` request and return vectors in input order.
pub(crate) async fn post_embeddings(
    client: &Client,
    base_url: &str,
    api_key: Option<&str>,
    model: &str,
    texts: &[String],
) -> Result<EmbedResponse, ProviderError> {
    #[derive(serde::Serialize)]
    struct EmbedRequest<'a> {
        model: &'a str,
        input: &'a [String],
    }

    let body = EmbedRequest {
        model,
        input: texts,
    };

    let mut req = client
        .post(format!("{}/v1/embeddings", base_url.trim_end_matches('/')))
        .json(&body);
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ProviderError::RequestFailed(format!(
            "{}: {}",
            status,
            error_message(&text)
        )));
    }

    let parsed: EmbeddingApiResponse = resp
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    collect_vectors(parsed, texts.len())
}

/// Order response rows by their `index` field and check that every input got exactly one vector.
///
/// Rows without any `index` are taken in response order. Otherwise the indices
/// must be a permutation of `0..expected`.
pub(crate) fn collect_vectors(
    parsed: EmbeddingApiResponse,
    expected: usize,
) -> Result<EmbedResponse, ProviderError> {
    let mut rows = parsed.data;
    if rows.len() != expected {
        return Err(ProviderError::MalformedResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            rows.len()
        )));
    }
    if rows.iter().any(|r| r.index.is_some()) {
        rows.sort_by_key(|r| r.index);
        if let Some((pos, row)) = rows
            .iter()
            .enumerate()
            .find(|(pos, r)| r.index != Some(*pos))
        {
            return Err(ProviderError::MalformedResponse(match row.index {
                Some(i) => format!(
                    "embedding index {} at position {} is duplicated or out of range",
                    i, pos
                ),
                None => "response mixes indexed and unindexed embeddings".to_string(),
            }));
        }
    }
    Ok(EmbedResponse {
        vectors: rows.into_iter().map(|d| d.embedding).collect(),
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        post_embeddings(
            &self.client,
            &self.cfg.base_url,
            Some(self.cfg.api_key.as_str()),
            &self.cfg.embedding_model,
            texts,
        )
        .await
    }

    fn model(&self) -> &str {
        &self.cfg.embedding_model
    }
}
