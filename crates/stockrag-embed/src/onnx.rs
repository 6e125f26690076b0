//! ONNX-based embedding model implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use stockrag_core::{Embedder, EmbeddingConfig, Result, StockRagError};

/// File names expected inside the model directory.
pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// ONNX-based sentence embedder (all-MiniLM-L6-v2 or a compatible BERT
/// encoder exported with `input_ids`, `attention_mask` and `token_type_ids`).
///
/// The model is symmetric: documents and queries are embedded the same way.
pub struct OnnxEmbedder {
    /// ONNX inference session (wrapped in Mutex for interior mutability).
    session: Mutex<Session>,

    /// Tokenizer for the model.
    tokenizer: Arc<Tokenizer>,

    dimension: usize,
    max_tokens: usize,
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Whether a model directory holds both the model and its tokenizer.
    pub fn is_available(model_dir: impl AsRef<Path>) -> bool {
        let dir = model_dir.as_ref();
        dir.join(MODEL_FILE).is_file() && dir.join(TOKENIZER_FILE).is_file()
    }

    /// Load the model described by the `[embedding]` configuration section.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let dir = &config.model_path;
        info!("Loading ONNX model from {:?}", dir.join(MODEL_FILE));

        let session = Session::builder()
            .map_err(|e| {
                StockRagError::embedding(format!("Failed to create session builder: {}", e))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                StockRagError::embedding(format!("Failed to set optimization level: {}", e))
            })?
            .with_intra_threads(config.num_threads.max(1))
            .map_err(|e| StockRagError::embedding(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(dir.join(MODEL_FILE))
            .map_err(|e| StockRagError::embedding(format!("Failed to load model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| StockRagError::embedding(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            "Embedder initialized: dim={}, max_tokens={}",
            config.dimension, config.max_tokens
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer: Arc::new(tokenizer),
            dimension: config.dimension,
            max_tokens: config.max_tokens.max(1),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Embed texts in batches of the configured size.
    fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch(batch)?);
        }
        Ok(embeddings)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| StockRagError::embedding(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_tokens);

        let batch_size = encodings.len();

        debug!("Embedding batch: size={}, max_len={}", batch_size, max_len);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = i64::from(ids[j]);
                attention_mask[i * max_len + j] = i64::from(mask[j]);
            }
        }

        let shape = vec![batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids)).map_err(|e| {
            StockRagError::embedding(format!("Failed to create input tensor: {}", e))
        })?;
        let attention_mask_tensor = Tensor::from_array((shape.clone(), attention_mask))
            .map_err(|e| StockRagError::embedding(format!("Failed to create mask tensor: {}", e)))?;
        let token_type_tensor = Tensor::from_array((shape, token_type_ids)).map_err(|e| {
            StockRagError::embedding(format!("Failed to create token type tensor: {}", e))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| StockRagError::embedding(format!("Failed to lock session: {}", e)))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_tensor
            ])
            .map_err(|e| StockRagError::embedding(format!("Inference failed: {}", e)))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| StockRagError::embedding("No output tensor found"))?;

        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| StockRagError::embedding(format!("Failed to extract tensor: {}", e)))?;

        let shape_dims: Vec<usize> = view.shape().to_vec();
        debug!("Output shape: {:?}", shape_dims);

        match shape_dims.len() {
            // (batch, seq, hidden): token embeddings, mean pool them
            3 => Ok(mean_pool(&view, &encodings, max_len)),
            // (batch, hidden): already pooled
            2 => {
                let hidden_dim = shape_dims[1];
                Ok((0..batch_size)
                    .map(|i| l2_normalize((0..hidden_dim).map(|j| view[[i, j]]).collect()))
                    .collect())
            }
            _ => Err(StockRagError::embedding(format!(
                "Unexpected output shape: {:?}",
                shape_dims
            ))),
        }
    }
}

/// Mean pooling over the sequence dimension, counting only attended tokens.
fn mean_pool(
    tensor: &ArrayViewD<'_, f32>,
    encodings: &[tokenizers::Encoding],
    max_len: usize,
) -> Vec<Vec<f32>> {
    let shape = tensor.shape();
    let seq_len = shape[1];
    let hidden_dim = shape[2];

    encodings
        .iter()
        .enumerate()
        .map(|(i, encoding)| {
            let mask = encoding.get_attention_mask();
            let mut sum = vec![0.0f32; hidden_dim];
            let mut valid = 0usize;

            for (j, &m) in mask.iter().take(max_len.min(seq_len)).enumerate() {
                if m == 1 {
                    valid += 1;
                    for (k, slot) in sum.iter_mut().enumerate() {
                        *slot += tensor[[i, j, k]];
                    }
                }
            }

            if valid == 0 {
                return sum;
            }
            l2_normalize(sum.into_iter().map(|s| s / valid as f32).collect())
        })
        .collect()
}

pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // Runs on the calling task; the session is guarded by a Mutex
        self.embed_all(texts)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| StockRagError::embedding("No embedding returned"))
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| StockRagError::embedding(format!("Tokenization failed: {}", e)))?;
        Ok(encoding.get_ids().len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}
