//! Embedding-backed document index.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use stockrag_core::{
    Document, DocumentStore, Embedder, Result, RetrievedDocument, SearchFilter,
    SimilaritySearch, StockRagError,
};

/// Pairs a document store with an embedder.
///
/// Documents are embedded on the way in; queries are embedded and matched
/// against the stored vectors on the way out.
pub struct DocumentIndex<S: ?Sized, E: ?Sized> {
    store: Arc<S>,
    embedder: Arc<E>,
}

impl<S, E> DocumentIndex<S, E>
where
    S: DocumentStore + ?Sized,
    E: Embedder + ?Sized,
{
    pub fn new(store: Arc<S>, embedder: Arc<E>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Embed and store documents whose identity is not stored yet.
    ///
    /// Returns how many documents were inserted.
    pub async fn add_documents(&self, docs: &[Document]) -> Result<usize> {
        let mut fresh = Vec::with_capacity(docs.len());
        for doc in docs {
            if self.store.contains(&doc.id).await? {
                debug!("Skipping stored document {}", doc.id);
            } else {
                fresh.push(doc);
            }
        }

        if fresh.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = fresh.iter().map(|d| d.text.as_str()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != fresh.len() {
            return Err(StockRagError::embedding(format!(
                "Expected {} embeddings, got {}",
                fresh.len(),
                embeddings.len()
            )));
        }

        let mut inserted = 0;
        for (doc, embedding) in fresh.iter().zip(embeddings.iter()) {
            if self.store.insert_document(doc, embedding).await? {
                inserted += 1;
            }
        }

        info!("Indexed {} of {} documents", inserted, docs.len());
        Ok(inserted)
    }

    /// Re-embed a document whose text changed and write it back.
    pub async fn reprocess(&self, doc: &Document) -> Result<()> {
        let embedding = self
            .embedder
            .embed_documents(&[doc.text.as_str()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StockRagError::embedding("No embedding returned"))?;
        self.store.update_document(doc, &embedding).await
    }
}

#[async_trait]
impl<S, E> SimilaritySearch for DocumentIndex<S, E>
where
    S: DocumentStore + ?Sized,
    E: Embedder + ?Sized,
{
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedDocument>> {
        let embedding = self.embedder.embed_query(query).await?;
        self.store.vector_search(&embedding, max_results, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use chrono::{TimeZone, Utc};
    use stockrag_core::{render_news_text, ContentType, DocumentMetadata, SummarySource};
    use stockrag_embed::HashingEmbedder;

    fn doc(url: &str, symbol: &str, title: &str, summary: &str) -> Document {
        Document::new(
            render_news_text(symbol, title, summary),
            DocumentMetadata {
                title: title.to_string(),
                source: "Wire".to_string(),
                source_url: url.to_string(),
                published_at: Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap(),
                content_type: ContentType::News,
                symbol: symbol.to_string(),
                summary_source: SummarySource::Feed,
            },
        )
    }

    fn index() -> DocumentIndex<SqliteStore, HashingEmbedder> {
        DocumentIndex::new(
            Arc::new(SqliteStore::open_memory().unwrap()),
            Arc::new(HashingEmbedder::new(384)),
        )
    }

    #[tokio::test]
    async fn test_add_documents_skips_known_ids() {
        let index = index();
        let docs = vec![
            doc("https://n.example/1", "ACME", "ACME jumps", "ACME jumps on strong earnings."),
            doc("https://n.example/2", "ACME", "ACME outlook", "Analysts upgrade ACME."),
        ];

        assert_eq!(index.add_documents(&docs).await.unwrap(), 2);
        assert_eq!(index.add_documents(&docs).await.unwrap(), 0);
        assert_eq!(index.store().get_stats(None).await.unwrap().documents, 2);
    }

    #[tokio::test]
    async fn test_search_prefers_overlapping_text() {
        let index = index();
        let docs = vec![
            doc(
                "https://n.example/1",
                "ACME",
                "ACME earnings beat",
                "ACME earnings beat estimates on cloud revenue.",
            ),
            doc(
                "https://n.example/2",
                "ACME",
                "Oil prices",
                "Crude oil slides as inventories build.",
            ),
        ];
        index.add_documents(&docs).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let filter = SearchFilter::lookback(48, now, None);
        let results = index.search("ACME earnings revenue", 2, &filter).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, docs[0].id);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_reprocess_updates_text() {
        let index = index();
        let original = doc("https://n.example/1", "ACME", "ACME jumps", "");
        index.add_documents(std::slice::from_ref(&original)).await.unwrap();

        let updated = original
            .clone()
            .with_summary("ACME jumps after upgrade.", SummarySource::LlmHeadline);
        index.reprocess(&updated).await.unwrap();

        let stored = index.store().get_document(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.summary(), Some("ACME jumps after upgrade."));
    }
}
