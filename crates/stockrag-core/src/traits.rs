//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Document, DocumentId, RetrievedDocument, SearchFilter, Stats};

/// Similarity search over the time-windowed document index.
///
/// Results are ordered by descending relevance (rank 0 first).
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedDocument>>;
}

/// Text generation service.
///
/// Failures are recoverable: callers degrade instead of aborting.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

/// Storage layer trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and its embedding.
    ///
    /// Returns `false` without touching the stored row when the identity
    /// already exists.
    async fn insert_document(&self, doc: &Document, embedding: &[f32]) -> Result<bool>;

    async fn contains(&self, id: &DocumentId) -> Result<bool>;

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// Replace text, metadata and embedding of an existing document.
    async fn update_document(&self, doc: &Document, embedding: &[f32]) -> Result<()>;

    /// Documents whose summary is waiting for a headline summary, oldest first.
    async fn documents_needing_summary(&self, limit: u32) -> Result<Vec<Document>>;

    /// Delete every document of a symbol, returning how many were removed.
    async fn delete_symbol(&self, symbol: &str) -> Result<u64>;

    /// Nearest documents to an embedding within the filter.
    async fn vector_search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedDocument>>;

    async fn get_stats(&self, symbol: Option<&str>) -> Result<Stats>;
}

/// Embedding model trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of document texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Count tokens in text.
    fn count_tokens(&self, text: &str) -> Result<usize>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the maximum context length in tokens.
    fn max_tokens(&self) -> usize;
}
