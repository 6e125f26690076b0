//! Evidence and news selection from fused documents.

use std::collections::HashSet;

use stockrag_core::{Evidence, NewsItem};

use crate::fusion::FusedDocument;

/// Up to `max` summaries with their links, in fused order, de-duplicated by
/// summary text. Documents without a summary are skipped.
pub fn select_evidence(documents: &[FusedDocument], max: usize) -> Vec<Evidence> {
    let mut seen = HashSet::new();
    documents
        .iter()
        .filter_map(|fused| {
            let doc = &fused.document;
            doc.summary().map(|summary| (summary, doc))
        })
        .filter(|(summary, _)| seen.insert(*summary))
        .take(max)
        .map(|(summary, doc)| Evidence {
            summary: summary.to_string(),
            source_url: doc.metadata.source_url.clone(),
        })
        .collect()
}

/// Up to `max` news items in fused order.
pub fn select_news(documents: &[FusedDocument], max: usize) -> Vec<NewsItem> {
    documents
        .iter()
        .take(max)
        .map(|fused| NewsItem::from(&fused.document))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stockrag_core::{ContentType, DocumentId, DocumentMetadata, RetrievedDocument, SummarySource};

    fn fused(key: &str, summary: Option<&str>) -> FusedDocument {
        let text = match summary {
            Some(s) => format!("Asset: ACME\nTitle: {}\nSummary: {}", key, s),
            None => "ACME stock rose 1.20% over the past 5 trading days.".to_string(),
        };
        FusedDocument {
            document: RetrievedDocument {
                id: DocumentId::from_raw(key),
                text,
                metadata: DocumentMetadata {
                    title: format!("title {}", key),
                    source: "Wire".to_string(),
                    source_url: format!("https://n.example/{}", key),
                    published_at: Utc.with_ymd_and_hms(2026, 10, 16, 8, 5, 0).unwrap(),
                    content_type: ContentType::News,
                    symbol: "ACME".to_string(),
                    summary_source: SummarySource::Feed,
                },
                similarity: 0.9,
            },
            score: 0.03,
        }
    }

    #[test]
    fn test_evidence_dedups_and_caps() {
        let docs = vec![
            fused("a", Some("ACME rises.")),
            fused("b", None),
            fused("c", Some("ACME rises.")),
            fused("d", Some("ACME gains.")),
            fused("e", Some("ACME jumps.")),
            fused("f", Some("ACME surges.")),
        ];

        let evidence = select_evidence(&docs, 3);
        assert_eq!(evidence.len(), 3);
        assert_eq!(evidence[0].summary, "ACME rises.");
        assert_eq!(evidence[0].source_url, "https://n.example/a");
        assert_eq!(evidence[1].summary, "ACME gains.");
        assert_eq!(evidence[2].summary, "ACME jumps.");
    }

    #[test]
    fn test_news_follows_fused_order() {
        let docs: Vec<_> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .map(|k| fused(k, None))
            .collect();

        let news = select_news(&docs, 5);
        assert_eq!(news.len(), 5);
        assert_eq!(news[0].title, "title a");
        assert_eq!(news[0].url, "https://n.example/a");
        assert_eq!(news[0].timestamp, "2026-10-16 08:05:00");
        assert_eq!(news[0].source, "Wire");
        assert_eq!(news[4].title, "title e");
    }
}
