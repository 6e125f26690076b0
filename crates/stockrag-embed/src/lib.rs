//! stockrag-embed - sentence embedders
//!
//! This crate provides the embedders the document index uses:
//!
//! - [`OnnxEmbedder`]: ONNX Runtime inference of all-MiniLM-L6-v2 with
//!   attention-masked mean pooling and L2 normalization
//! - [`HashingEmbedder`]: feature-hashing fallback that needs no model files

mod hashing;
mod onnx;

use std::sync::Arc;

use tracing::{info, warn};

pub use hashing::HashingEmbedder;
pub use onnx::{OnnxEmbedder, MODEL_FILE, TOKENIZER_FILE};

// Re-export the Embedder trait for convenience
pub use stockrag_core::Embedder;

use stockrag_core::EmbeddingConfig;

/// Build the embedder for a configuration.
///
/// Uses the ONNX model when its files are present and load, otherwise the
/// feature-hashing embedder with the configured dimension.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    if OnnxEmbedder::is_available(&config.model_path) {
        match OnnxEmbedder::from_config(config) {
            Ok(embedder) => return Arc::new(embedder),
            Err(e) => warn!("Falling back to hashing embedder: {}", e),
        }
    } else {
        info!(
            "No ONNX model at {:?}, using hashing embedder",
            config.model_path
        );
    }

    Arc::new(HashingEmbedder::with_config(
        config.dimension,
        config.max_tokens,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_falls_back_to_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            model_path: dir.path().join("absent"),
            dimension: 64,
            ..EmbeddingConfig::default()
        };
        let embedder = embedder_from_config(&config);
        assert_eq!(embedder.dimension(), 64);
        assert_eq!(embedder.max_tokens(), 256);
    }
}
