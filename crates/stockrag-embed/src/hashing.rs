//! Feature-hashing embedder.
//!
//! Works offline with no model files: lower-cased alphanumeric tokens are
//! hashed into a fixed number of buckets and the counts are L2 normalized.
//! Texts sharing vocabulary end up close in cosine space, which is enough for
//! tests and for running without a downloaded model.

use async_trait::async_trait;

use stockrag_core::{Embedder, Result};

use crate::onnx::l2_normalize;

/// Bag-of-words embedder over blake3-hashed token buckets.
pub struct HashingEmbedder {
    dimension: usize,
    max_tokens: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            max_tokens: 256,
        }
    }

    /// Create an embedder with a custom token limit.
    pub fn with_config(dimension: usize, max_tokens: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            max_tokens: max_tokens.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut buckets = vec![0.0f32; self.dimension];
        for token in tokens(text).take(self.max_tokens) {
            let hash = blake3::hash(token.as_bytes());
            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&hash.as_bytes()[..8]);
            let bucket = (u64::from_le_bytes(prefix) % self.dimension as u64) as usize;
            buckets[bucket] += 1.0;
        }
        l2_normalize(buckets)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(tokens(text).count())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_embeddings_are_normalized() {
        let embedder = HashingEmbedder::new(384);
        let embeddings = embedder
            .embed_documents(&["ACME shares jump", "Oil slides"])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        for e in &embeddings {
            assert_eq!(e.len(), 384);
            let norm: f32 = e.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_deterministic_and_case_insensitive() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_query("ACME Earnings").await.unwrap();
        let b = embedder.embed_query("acme earnings").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_query("acme stock performance").await.unwrap();
        let near = embedder
            .embed_query("ACME stock performance this week")
            .await
            .unwrap();
        let far = embedder.embed_query("crude oil inventories build").await.unwrap();
        assert!(cosine(&query, &near) > cosine(&query, &far));
    }

    #[tokio::test]
    async fn test_empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        let e = embedder.embed_query("  --  ").await.unwrap();
        assert!(e.iter().all(|x| *x == 0.0));
        assert_eq!(embedder.count_tokens("  --  ").unwrap(), 0);
    }

    #[test]
    fn test_count_tokens() {
        let embedder = HashingEmbedder::with_config(16, 4);
        assert_eq!(embedder.count_tokens("ACME rose 2.5% today").unwrap(), 5);
        assert_eq!(embedder.max_tokens(), 4);
    }
}
