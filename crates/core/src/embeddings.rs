use crate::error::{PipelineError, Result};
use providers::ProviderRegistry;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f32>>,
}

pub async fn embed(req: EmbeddingRequest, registry: &ProviderRegistry) -> Result<EmbeddingResult> {
    let provider = registry.embedding(req.provider.as_deref())?;
    let resp = provider.embed(&req.texts).await?;
    Ok(EmbeddingResult {
        vectors: resp.vectors,
    })
}

/// Embed `texts` in batches, failing on the first rejected batch.
///
/// The result has exactly one vector per input, in input order, all of the
/// same dimension.
pub async fn embed_batched(
    texts: &[String],
    provider: Option<&str>,
    batch_size: usize,
    registry: &ProviderRegistry,
) -> Result<Vec<Vec<f32>>> {
    let provider = registry.embedding(provider)?;
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for (batch_no, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        let offset = vectors.len();
        let resp = provider.embed(batch).await.map_err(|e| {
            PipelineError::Embedding(format!("batch starting at record {}: {}", offset, e))
        })?;
        if resp.vectors.len() != batch.len() {
            return Err(PipelineError::Embedding(format!(
                "provider returned {} vectors for {} texts",
                resp.vectors.len(),
                batch.len()
            )));
        }
        vectors.extend(resp.vectors);
        debug!(batch = batch_no, embedded = vectors.len(), "embedded batch");
    }

    if let Some(first) = vectors.first() {
        let dim = first.len();
        if let Some(pos) = vectors.iter().position(|v| v.len() != dim) {
            return Err(PipelineError::Embedding(format!(
                "record {} has dimension {}, expected {}",
                pos,
                vectors[pos].len(),
                dim
            )));
        }
    }
    Ok(vectors)
}
