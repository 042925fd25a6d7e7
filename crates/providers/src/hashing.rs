//! Local feature-hashing sentence embedder.
//!
//! Words are lower-cased, hashed with blake3 into a fixed number of buckets and
//! the resulting count vector is L2-normalised. No model download, no network,
//! and identical output for identical input.

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};
use unicode_segmentation::UnicodeSegmentation;

/// Model name every hashing configuration answers to.
pub const FAMILY: &str = "hashing-bow";

#[derive(Debug, Clone)]
pub struct HashingConfig {
    pub dimension: usize,
    pub max_input_chars: usize,
    pub bigrams: bool,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            max_input_chars: 2048,
            bigrams: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    cfg: HashingConfig,
    model: String,
}

impl HashingEmbedder {
    pub fn new(cfg: HashingConfig) -> Self {
        let dimension = cfg.dimension.max(1);
        let model = if cfg.bigrams {
            format!("{}-{}-bigrams", FAMILY, dimension)
        } else {
            format!("{}-{}", FAMILY, dimension)
        };
        Self {
            cfg: HashingConfig { dimension, ..cfg },
            model,
        }
    }

    /// Embed a single text. Fails if the text exceeds the configured input length.
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>, String> {
        let chars = text.chars().count();
        if chars > self.cfg.max_input_chars {
            return Err(format!(
                "text has {} characters, limit is {}",
                chars, self.cfg.max_input_chars
            ));
        }

        let words: Vec<String> = text.unicode_words().map(str::to_lowercase).collect();
        let mut vector = vec![0f32; self.cfg.dimension];
        for word in &words {
            vector[self.bucket(word)] += 1.0;
        }
        if self.cfg.bigrams {
            for pair in words.windows(2) {
                let joined = format!("{} {}", pair[0], pair[1]);
                vector[self.bucket(&joined)] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn bucket(&self, feature: &str) -> usize {
        let hash = blake3::hash(feature.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(head) % self.cfg.dimension as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let vector = self
                .embed_one(text)
                .map_err(|reason| ProviderError::InputRejected { index, reason })?;
            vectors.push(vector);
        }
        tracing::debug!(model = %self.model, count = vectors.len(), "hashed embeddings");
        Ok(EmbedResponse { vectors })
    }

    fn model(&self) -> &str {
        &self.model
    }

    /// Accepts the family name as well as the fully qualified one.
    fn supports_model(&self, name: &str) -> bool {
        name == FAMILY || name == self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn vectors_are_unit_length() {
        let e = HashingEmbedder::new(HashingConfig::default());
        let v = e.embed_one("All cats are mammals").unwrap();
        assert_eq!(v.len(), 384);
        assert!((dot(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identical_text_gives_identical_vector() {
        let e = HashingEmbedder::new(HashingConfig::default());
        assert_eq!(
            e.embed_one("it rained").unwrap(),
            e.embed_one("it rained").unwrap()
        );
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashingEmbedder::new(HashingConfig::default());
        assert_eq!(
            e.embed_one("Cats, mammals!").unwrap(),
            e.embed_one("cats mammals").unwrap()
        );
    }

    #[test]
    fn empty_text_is_a_zero_vector() {
        let e = HashingEmbedder::new(HashingConfig::default());
        let v = e.embed_one("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn overlong_input_is_rejected() {
        let e = HashingEmbedder::new(HashingConfig {
            max_input_chars: 5,
            ..HashingConfig::default()
        });
        assert!(e.embed_one("abcdef").is_err());
        assert!(e.embed_one("abcde").is_ok());
    }

    #[tokio::test]
    async fn batch_rejection_names_the_offending_input() {
        let e = HashingEmbedder::new(HashingConfig {
            max_input_chars: 4,
            ..HashingConfig::default()
        });
        let texts = vec!["ok".to_string(), "too long".to_string()];
        let err = e.embed(&texts).await.unwrap_err();
        assert!(matches!(err, ProviderError::InputRejected { index: 1, .. }));
    }

    #[test]
    fn bigrams_change_the_model_name() {
        let e = HashingEmbedder::new(HashingConfig {
            bigrams: true,
            dimension: 64,
            ..HashingConfig::default()
        });
        assert_eq!(e.model(), "hashing-bow-64-bigrams");
        assert_eq!(e.embed_one("a b").unwrap().len(), 64);
    }

    #[test]
    fn serves_only_hashing_model_names() {
        let e = HashingEmbedder::new(HashingConfig::default());
        assert!(e.supports_model("hashing-bow"));
        assert!(e.supports_model("hashing-bow-384"));
        assert!(!e.supports_model("hashing-bow-128"));
        assert!(!e.supports_model("sentence-transformers/all-MiniLM-L6-v2"));
    }
}
