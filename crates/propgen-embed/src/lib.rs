//! Embedding providers.
//!
//! `EmbeddingModel` runs a local BGE-M3 (XLM-RoBERTa) checkpoint through
//! candle and pools token states into L2-normalized 1024-d vectors.
//! `HashEmbedder` is a deterministic token-hashing provider for tests and
//! offline runs; `PROPGEN_USE_HASH_EMBEDDINGS=1` selects it in
//! [`default_embedder`].

use anyhow::anyhow;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use propgen_core::error::{Error, Result};
use propgen_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub const MODEL_DIM: usize = 1024;
const MODEL_MAX_LEN: usize = 256;

fn embedding_error(reason: impl std::fmt::Display) -> Error {
    Error::Embedding { stage: "embed", reason: reason.to_string() }
}

/// Reject input the provider cannot encode. A zero vector for empty text
/// would silently index garbage, so this is a hard failure.
fn check_encodable(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(embedding_error("empty or whitespace-only input text"));
    }
    Ok(())
}

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl EmbeddingModel {
    pub fn new() -> Result<Self> {
        let device = device::select_device();
        let model_dir = resolve_model_dir().map_err(embedding_error)?;
        tracing::info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| embedding_error(format!("failed to load tokenizer from {}: {e}", tokenizer_path.display())))?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = std::fs::read_to_string(&config_path)
            .map_err(embedding_error)
            .and_then(|s| serde_json::from_str(&s).map_err(embedding_error))?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path).map_err(embedding_error)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb).map_err(embedding_error)?;
        tracing::info!("embedding model loaded");
        Ok(Self { model, tokenizer, device })
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) =
            tokenize::tokenize_on_device(&self.tokenizer, text, MODEL_MAX_LEN, &self.device)
                .map_err(embedding_error)?;
        let token_type_ids =
            Tensor::zeros((1, MODEL_MAX_LEN), DType::I64, &self.device).map_err(embedding_error)?;
        let hidden = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
            .map_err(embedding_error)?;
        let pooled = pool::masked_mean_l2(&hidden, &attention_mask).map_err(embedding_error)?;
        let vector: Vec<f32> = pooled
            .to_device(&Device::Cpu)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1())
            .map_err(embedding_error)?;
        if vector.len() != MODEL_DIM {
            return Err(embedding_error(format!(
                "model produced {}-d vector, expected {MODEL_DIM}",
                vector.len()
            )));
        }
        Ok(vector)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize {
        MODEL_DIM
    }

    fn max_len(&self) -> usize {
        MODEL_MAX_LEN
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        check_encodable(text)?;
        self.encode(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text)?);
        }
        Ok(out)
    }
}

/// Token-hashing embedder: each whitespace token deterministically bumps
/// one dimension, then the vector is L2-normalized. No model weights, no
/// I/O, stable across runs.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        check_encodable(text)?;
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Select the provider from the environment: the hashing embedder when
/// `PROPGEN_USE_HASH_EMBEDDINGS` is truthy, otherwise the local model.
pub fn default_embedder() -> Result<Box<dyn Embedder>> {
    let use_hash = std::env::var("PROPGEN_USE_HASH_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_hash {
        tracing::info!("using deterministic hash embedder");
        return Ok(Box::new(HashEmbedder::new(MODEL_DIM)));
    }
    Ok(Box::new(EmbeddingModel::new()?))
}

fn resolve_model_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("PROPGEN_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
    }
    if let Ok(dir) = std::env::var("MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
    }
    let root = Path::new("../models/bge-m3");
    if root.exists() {
        return Ok(root.to_path_buf());
    }
    let legacy = Path::new("models/bge-m3");
    if legacy.exists() {
        return Ok(legacy.to_path_buf());
    }
    Err(anyhow!("could not locate the embedding model directory (set PROPGEN_MODEL_DIR)"))
}
