//! Pretrained sentence-transformer embeddings run in-process through ONNX Runtime.
//!
//! A model named `org/name` is read from `<model_dir>/org/name/`, which must hold
//! `model.onnx` and `tokenizer.json` (a HuggingFace fast-tokenizer file). Token
//! embeddings are mean-pooled under the attention mask and L2-normalised, as
//! sentence-transformers does for all-MiniLM-L6-v2.
//!
//! The ONNX Runtime shared library is loaded at runtime (`ORT_DYLIB_PATH`).

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::info;

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Directory holding one sub-directory per model name.
    pub model_dir: PathBuf,
    /// Model name, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    pub model: String,
    pub max_input_chars: usize,
}

pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model: String,
    max_input_chars: usize,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("model", &self.model)
            .finish()
    }
}

impl OnnxEmbedder {
    /// Load the configured model's ONNX export and tokenizer.
    pub fn load(cfg: OnnxConfig) -> Result<Self, ProviderError> {
        let dir = cfg.model_dir.join(&cfg.model);
        let model_path = dir.join("model.onnx");
        let tokenizer_path = dir.join("tokenizer.json");
        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(ProviderError::ModelUnavailable(format!(
                    "{}: {} not found",
                    cfg.model,
                    path.display()
                )));
            }
        }

        let unavailable = |what: &str, e: String| {
            ProviderError::ModelUnavailable(format!("{}: {}: {}", cfg.model, what, e))
        };
        let session = Session::builder()
            .map_err(|e| unavailable("session builder", e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| unavailable("set threads", e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e| unavailable("load model", e.to_string()))?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| unavailable("load tokenizer", e.to_string()))?;

        info!(model = %cfg.model, path = %model_path.display(), "loaded ONNX embedding model");
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model: cfg.model,
            max_input_chars: cfg.max_input_chars,
        })
    }
}

fn to_array(values: Vec<i64>, what: &str) -> Result<ndarray::Array2<i64>, ProviderError> {
    let len = values.len();
    ndarray::Array2::from_shape_vec((1, len), values)
        .map_err(|e| ProviderError::MalformedResponse(format!("{}: {}", what, e)))
}

/// Tokenize, run the session and mean-pool one text.
fn embed_text(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    text: &str,
) -> Result<Vec<f32>, ProviderError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| ProviderError::RequestFailed(format!("tokenization failed: {}", e)))?;
    let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();
    let types: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();

    let ids_array = to_array(ids, "input_ids")?;
    let mask_array = to_array(mask.clone(), "attention_mask")?;
    let type_array = to_array(types, "token_type_ids")?;
    let ids_ref = TensorRef::from_array_view(&ids_array)
        .map_err(|e| ProviderError::RequestFailed(format!("input_ids tensor: {}", e)))?;
    let mask_ref = TensorRef::from_array_view(&mask_array)
        .map_err(|e| ProviderError::RequestFailed(format!("attention_mask tensor: {}", e)))?;
    let type_ref = TensorRef::from_array_view(&type_array)
        .map_err(|e| ProviderError::RequestFailed(format!("token_type_ids tensor: {}", e)))?;

    let mut session = session
        .lock()
        .map_err(|e| ProviderError::RequestFailed(format!("session lock poisoned: {}", e)))?;
    let outputs = session
        .run(ort::inputs![ids_ref, mask_ref, type_ref])
        .map_err(|e| ProviderError::RequestFailed(format!("inference failed: {}", e)))?;
    let (shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| ProviderError::MalformedResponse(format!("extract embeddings: {}", e)))?;

    // [1, seq_len, hidden]
    let dims: Vec<i64> = shape.iter().copied().collect();
    let hidden = match dims.as_slice() {
        [_, _, hidden] if *hidden > 0 => *hidden as usize,
        _ => {
            return Err(ProviderError::MalformedResponse(format!(
                "unexpected output shape {:?}",
                dims
            )))
        }
    };

    let mut pooled = vec![0f32; hidden];
    let mut count = 0f32;
    for (tok, &m) in mask.iter().enumerate() {
        if m > 0 {
            let row = &data[tok * hidden..(tok + 1) * hidden];
            for (p, v) in pooled.iter_mut().zip(row) {
                *p += v;
            }
            count += 1.0;
        }
    }
    if count > 0.0 {
        for p in pooled.iter_mut() {
            *p /= count;
        }
    }
    let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for p in pooled.iter_mut() {
            *p /= norm;
        }
    }
    Ok(pooled)
}

#[async_trait::async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        for (index, text) in texts.iter().enumerate() {
            let chars = text.chars().count();
            if chars > self.max_input_chars {
                return Err(ProviderError::InputRejected {
                    index,
                    reason: format!(
                        "text has {} characters, limit is {}",
                        chars, self.max_input_chars
                    ),
                });
            }
        }

        // Inference is CPU-bound.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|t| embed_text(&session, &tokenizer, t))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ProviderError::RequestFailed(format!("embedding task failed: {}", e)))??;
        Ok(EmbedResponse { vectors })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_directory_names_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxEmbedder::load(OnnxConfig {
            model_dir: dir.path().to_path_buf(),
            model: "sentence-transformers/all-MiniLM-L6-v2".into(),
            max_input_chars: 2048,
        })
        .unwrap_err();
        match err {
            ProviderError::ModelUnavailable(msg) => {
                assert!(msg.starts_with("sentence-transformers/all-MiniLM-L6-v2: "));
                assert!(msg.contains("model.onnx"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_tokenizer_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("tiny");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("model.onnx"), b"").unwrap();
        let err = OnnxEmbedder::load(OnnxConfig {
            model_dir: dir.path().to_path_buf(),
            model: "tiny".into(),
            max_input_chars: 2048,
        })
        .unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"));
    }
}
