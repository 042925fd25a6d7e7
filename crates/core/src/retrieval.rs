//! Embedding-based nearest-neighbour retrieval over an in-memory corpus.

use crate::config::EmbeddingConfig;
use crate::embeddings::{self, EmbeddingRequest};
use crate::error::{PipelineError, Result};
use crate::models::{IndexSummary, Record, RetrievalHit, RetrievalReport};
use crate::similarity::{cosine_similarity, rank_top_k};
use providers::ProviderRegistry;
use tracing::{info, warn};

/// Records and their embeddings, row `i` belonging to record `i`.
#[derive(Debug, Clone)]
struct Index {
    records: Vec<Record>,
    matrix: Vec<Vec<f32>>,
    dimension: usize,
}

pub struct RetrievalEngine {
    registry: ProviderRegistry,
    provider: String,
    model: String,
    batch_size: usize,
    index: Option<Index>,
}

impl RetrievalEngine {
    /// Bind the engine to the provider named in `cfg`. Fails if it is not
    /// registered or cannot serve the configured model.
    pub fn new(registry: ProviderRegistry, cfg: &EmbeddingConfig) -> Result<Self> {
        let provider = registry.embedding(Some(cfg.provider.as_str()))?;
        if !provider.supports_model(&cfg.model) {
            return Err(PipelineError::Embedding(format!(
                "provider `{}` serves `{}`, not the configured model `{}`",
                cfg.provider,
                provider.model(),
                cfg.model
            )));
        }
        let model = provider.model().to_string();
        Ok(Self {
            registry,
            provider: cfg.provider.clone(),
            model,
            batch_size: cfg.batch_size,
            index: None,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Number of indexed records, or 0 before `build_index`.
    pub fn len(&self) -> usize {
        self.index.as_ref().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed every record's text and replace the index.
    ///
    /// Any rejected text fails the whole build and leaves the previous index in place.
    pub async fn build_index(&mut self, records: &[Record]) -> Result<IndexSummary> {
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let matrix = embeddings::embed_batched(
            &texts,
            Some(self.provider.as_str()),
            self.batch_size,
            &self.registry,
        )
        .await?;

        let dimension = matrix.first().map(Vec::len).unwrap_or(0);
        if records.is_empty() {
            warn!("building retrieval index over an empty corpus");
        }
        let degenerate = matrix
            .iter()
            .filter(|v| v.iter().all(|x| *x == 0.0))
            .count();
        if degenerate > 0 {
            warn!(degenerate, "zero-magnitude embeddings will score 0 against every query");
        }

        self.index = Some(Index {
            records: records.to_vec(),
            matrix,
            dimension,
        });
        let summary = IndexSummary {
            records: records.len(),
            dimension,
            model: self.model.clone(),
        };
        info!(
            records = summary.records,
            dimension = summary.dimension,
            model = %summary.model,
            "retrieval index built"
        );
        Ok(summary)
    }

    /// Rank indexed records by cosine similarity to `text`.
    ///
    /// `top_k` above the corpus size is clamped; ties keep corpus order.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<RetrievalReport> {
        let index = self.index.as_ref().ok_or(PipelineError::NotIndexed)?;
        if top_k == 0 {
            return Err(PipelineError::InvalidTopK(top_k));
        }

        let result = embeddings::embed(
            EmbeddingRequest {
                texts: vec![text.to_string()],
                provider: Some(self.provider.clone()),
            },
            &self.registry,
        )
        .await?;
        let vector = result
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Embedding("provider returned no query vector".into()))?;
        if !index.matrix.is_empty() && vector.len() != index.dimension {
            return Err(PipelineError::Embedding(format!(
                "query has dimension {}, index has {}",
                vector.len(),
                index.dimension
            )));
        }

        let scores: Vec<f64> = index
            .matrix
            .iter()
            .map(|row| cosine_similarity(&vector, row))
            .collect();
        let results = rank_top_k(&scores, top_k)
            .into_iter()
            .map(|i| RetrievalHit {
                text: index.records[i].text.clone(),
                label: index.records[i].label.clone(),
                score: scores[i],
            })
            .collect();

        Ok(RetrievalReport {
            query: text.to_string(),
            results,
        })
    }

    /// Run `query` for each text in order.
    pub async fn query_many<S: AsRef<str>>(
        &self,
        texts: &[S],
        top_k: usize,
    ) -> Result<Vec<RetrievalReport>> {
        let mut reports = Vec::with_capacity(texts.len());
        for text in texts {
            reports.push(self.query(text.as_ref(), top_k).await?);
        }
        Ok(reports)
    }
}
