// Local sentence embeddings via candle (BERT family, e.g. BAAI/bge-small-en)
use anyhow::{Context, Result as AnyResult};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::{Tokenizer, TruncationParams};

use super::{l2_normalize, Embedder, Pooling};
use crate::config::EmbeddingConfig;
use crate::errors::{Result, ScopeError};

const MAX_SEQUENCE_LEN: usize = 512;
const BATCH_SIZE: usize = 32;

/// BERT sentence embedder running on CPU
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    pooling: Pooling,
    dimension: usize,
}

impl BertEmbedder {
    /// Load the configured model (downloads it from the hub on first use)
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Self::load(&config.model_id, config.pooling)
            .map_err(|e| ScopeError::Embedding(format!("{:#}", e)))
    }

    fn load(model_id: &str, pooling: Pooling) -> AnyResult<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .context("Failed to download model config")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("Failed to download tokenizer")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("Failed to download model weights")?;

        let config_contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&config_contents).context("Failed to parse model config")?;
        let dimension = serde_json::from_str::<serde_json::Value>(&config_contents)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .context("Model config has no hidden_size")? as usize;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to create BERT model")?;

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: model_id.to_string(),
            pooling,
            dimension,
        })
    }

    fn embed_chunk(&self, texts: &[&str]) -> AnyResult<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = texts.len();

        // Pad to the longest sequence in the batch
        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            flat_ids[i * max_len..i * max_len + ids.len()].copy_from_slice(ids);
            flat_mask[i * max_len..i * max_len + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = match self.pooling {
            Pooling::Cls => hidden.i((.., 0))?,
            Pooling::Mean => Self::mean_pool(&hidden, &attention_mask)?,
        };

        let mut vectors = pooled.to_vec2::<f32>()?;
        for vector in vectors.iter_mut() {
            l2_normalize(vector);
        }
        Ok(vectors)
    }

    /// Mean pooling with attention mask
    fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> AnyResult<Tensor> {
        let mask = attention_mask
            .unsqueeze(2)?
            .expand(hidden.shape())?
            .to_dtype(hidden.dtype())?;

        let summed = (hidden * &mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;

        Ok(summed.broadcast_div(&counts)?)
    }
}

impl Embedder for BertEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let embedded = self
                .embed_chunk(batch)
                .map_err(|e| ScopeError::Embedding(format!("{:#}", e)))?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> BertEmbedder {
        BertEmbedder::new(&EmbeddingConfig::default()).expect("Failed to create engine")
    }

    #[test]
    #[ignore] // requires model download
    fn test_embedding_dimension() {
        assert_eq!(engine().dimension(), 384);
    }

    #[test]
    #[ignore] // requires model download
    fn test_embeddings_are_normalized_and_deterministic() {
        let engine = engine();
        let a = engine.embed("Payroll module with payslip export").unwrap();
        let b = engine.embed("Payroll module with payslip export").unwrap();

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert_eq!(a, b);
    }

    #[test]
    #[ignore] // requires model download
    fn test_embed_empty_batch() {
        let embeddings = engine().embed_batch(&[]).unwrap();
        assert!(embeddings.is_empty());
    }
}
