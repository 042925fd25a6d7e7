//! Core library: dataset loading, TF-IDF classification, embedding retrieval.

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod similarity;
pub mod vectorizer;

pub use error::{PipelineError, Result};
