//! Sentence embeddings for document chunks
//!
//! The pipeline only depends on the [`Embedder`] trait. The production
//! implementation is [`BertEmbedder`], which runs a BERT-family model locally
//! through candle. It is constructed once by the caller and handed to the
//! pipeline explicitly.

pub mod engine;

use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::errors::{Result, ScopeError};

pub use engine::BertEmbedder;

/// How token embeddings are reduced to one sentence vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Use the `[CLS]` token (BGE models)
    Cls,
    /// Attention-masked mean over all tokens
    Mean,
}

/// Maps chunk texts to fixed-length, L2-normalized vectors
pub trait Embedder {
    /// Embed many texts; output order matches input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimensionality
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model
    fn model_id(&self) -> &str;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| ScopeError::Embedding("model returned no vector".to_string()))
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Stand-in for a model that failed to load. Every call fails with the load
/// error, so the embed and index stages degrade instead of aborting the run.
#[derive(Debug, Clone)]
pub struct UnavailableEmbedder {
    model_id: String,
    reason: String,
}

impl UnavailableEmbedder {
    pub fn new(model_id: &str, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Embedder for UnavailableEmbedder {
    fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Err(ScopeError::Embedding(format!(
            "{} unavailable: {}",
            self.model_id, self.reason
        )))
    }

    fn dimension(&self) -> usize {
        0
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Load the configured model, or an [`UnavailableEmbedder`] carrying the
/// load error when that fails
pub fn load_embedder(config: &EmbeddingConfig) -> Box<dyn Embedder> {
    match BertEmbedder::new(config) {
        Ok(embedder) => Box::new(embedder),
        Err(e) => Box::new(UnavailableEmbedder::new(&config.model_id, e.to_string())),
    }
}
