//! One similarity search per expanded query.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use stockrag_core::{RetrievedDocument, SearchFilter, SimilaritySearch, StockRagError};

/// Documents returned for one query, rank 0 first.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    pub query: String,
    pub documents: Vec<RetrievedDocument>,
}

impl RankedList {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Runs the per-query searches concurrently and joins them.
pub struct MultiQueryRetriever {
    search: Arc<dyn SimilaritySearch>,
    timeout: Duration,
}

impl MultiQueryRetriever {
    pub fn new(search: Arc<dyn SimilaritySearch>, timeout: Duration) -> Self {
        Self { search, timeout }
    }

    /// One ranked list per query, in query order.
    ///
    /// A failed or timed-out search contributes an empty list.
    pub async fn retrieve<'a, I>(&self, queries: I, filter: &SearchFilter, n: usize) -> Vec<RankedList>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let searches = queries.into_iter().map(|query| async move {
            let result = tokio::time::timeout(self.timeout, self.search.search(query, n, filter))
                .await
                .unwrap_or_else(|_| {
                    Err(StockRagError::timeout("similarity search", self.timeout.as_millis() as u64))
                });

            let documents = match result {
                Ok(documents) => documents,
                Err(e) => {
                    warn!("Search failed for {:?}: {}", query, e);
                    Vec::new()
                }
            };

            debug!("Query {:?} returned {} documents", query, documents.len());
            RankedList {
                query: query.to_string(),
                documents,
            }
        });

        join_all(searches).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use stockrag_core::{ContentType, DocumentId, DocumentMetadata, Result, SummarySource};

    /// Answers with one document named after the query; "fail" errors and
    /// "slow" sleeps past the timeout.
    struct EchoSearch;

    #[async_trait]
    impl SimilaritySearch for EchoSearch {
        async fn search(
            &self,
            query: &str,
            max_results: usize,
            _filter: &SearchFilter,
        ) -> Result<Vec<RetrievedDocument>> {
            match query {
                "fail" => Err(StockRagError::retrieval("index offline")),
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(Vec::new())
                }
                _ => Ok((0..max_results)
                    .map(|i| RetrievedDocument {
                        id: DocumentId::from_raw(format!("{}-{}", query, i)),
                        text: format!("Summary: {}", query),
                        metadata: DocumentMetadata {
                            title: query.to_string(),
                            source: "Wire".to_string(),
                            source_url: String::new(),
                            published_at: Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap(),
                            content_type: ContentType::News,
                            symbol: "ACME".to_string(),
                            summary_source: SummarySource::Feed,
                        },
                        similarity: 1.0,
                    })
                    .collect()),
            }
        }
    }

    fn filter() -> SearchFilter {
        SearchFilter::lookback(48, Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap(), None)
    }

    #[tokio::test]
    async fn test_one_list_per_query_in_order() {
        let retriever = MultiQueryRetriever::new(Arc::new(EchoSearch), Duration::from_secs(1));
        let lists = retriever.retrieve(["alpha", "beta"], &filter(), 2).await;

        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].query, "alpha");
        assert_eq!(lists[1].query, "beta");
        assert_eq!(lists[0].documents.len(), 2);
        assert_eq!(lists[1].documents[0].id.as_str(), "beta-0");
    }

    #[tokio::test]
    async fn test_failures_become_empty_lists() {
        let retriever = MultiQueryRetriever::new(Arc::new(EchoSearch), Duration::from_millis(20));
        let lists = retriever.retrieve(["alpha", "fail", "slow"], &filter(), 1).await;

        assert_eq!(lists.len(), 3);
        assert!(!lists[0].is_empty());
        assert!(lists[1].is_empty());
        assert!(lists[2].is_empty());
        assert_eq!(lists[2].query, "slow");
    }
}
