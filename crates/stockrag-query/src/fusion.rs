//! Reciprocal Rank Fusion (RRF) across per-query rankings and an
//! intent-relevance ranking.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use stockrag_core::{DocumentId, LexiconConfig, RetrievedDocument};

use crate::intent::Intent;
use crate::retriever::RankedList;

/// RRF constant.
/// Higher values give more weight to lower-ranked results.
pub const RRF_K: f64 = 60.0;

/// Score contributed by a 0-based rank: `1 / (k + rank + 1)`.
pub fn rrf_contribution(rank: usize) -> f64 {
    1.0 / (RRF_K + rank as f64 + 1.0)
}

/// Fuse rankings using Reciprocal Rank Fusion.
///
/// Returns every identity that appears in at least one ranking with its
/// fused score, sorted by score descending. Equal scores keep the order in
/// which identities were first encountered.
pub fn reciprocal_rank_fusion<T>(rankings: &[Vec<T>]) -> Vec<(T, f64)>
where
    T: Eq + Hash + Clone,
{
    let mut slots: HashMap<&T, usize> = HashMap::new();
    let mut fused: Vec<(T, f64)> = Vec::new();

    for ranking in rankings {
        for (rank, id) in ranking.iter().enumerate() {
            let slot = *slots.entry(id).or_insert_with(|| {
                fused.push((id.clone(), 0.0));
                fused.len() - 1
            });
            fused[slot].1 += rrf_contribution(rank);
        }
    }

    // Stable sort keeps first-encounter order for ties
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

/// Term lists used to score summaries for the performance intent.
#[derive(Debug, Clone)]
pub struct IntentRelevance {
    positive: Vec<String>,
    negative: Vec<String>,
    speculative: Vec<String>,
}

impl IntentRelevance {
    pub fn new(lexicon: &LexiconConfig) -> Self {
        let lower = |terms: &[String]| {
            terms
                .iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            positive: lower(&lexicon.performance_positive),
            negative: lower(&lexicon.performance_negative),
            speculative: lower(&lexicon.speculative),
        }
    }

    /// Relevance of a summary to an intent.
    ///
    /// Only the performance intent scores: +1 per occurrence of a positive
    /// term, -1 per negative or speculative term, counted as non-overlapping
    /// substrings of the lower-cased summary. Every other intent scores 0.
    pub fn score_summary(&self, summary: &str, intent: Intent) -> i64 {
        if intent != Intent::Performance {
            return 0;
        }

        let text = summary.to_lowercase();
        let count = |terms: &[String]| -> i64 {
            terms
                .iter()
                .map(|t| text.matches(t.as_str()).count() as i64)
                .sum()
        };

        count(&self.positive) - count(&self.negative) - count(&self.speculative)
    }
}

impl Default for IntentRelevance {
    fn default() -> Self {
        Self::new(&LexiconConfig::default())
    }
}

/// Free-function form of [`IntentRelevance::score_summary`] with the default
/// term lists.
pub fn score_summary_for_intent(summary: &str, intent: Intent) -> i64 {
    IntentRelevance::default().score_summary(summary, intent)
}

/// A fused document with its RRF score.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedDocument {
    pub document: RetrievedDocument,
    pub score: f64,
}

/// Output of fusion: documents in fused order and the rankings that produced
/// them (per-query lists followed by the intent list).
#[derive(Debug, Clone)]
pub struct FusedResults {
    pub intent: Intent,
    pub documents: Vec<FusedDocument>,
    rankings: Vec<Vec<DocumentId>>,
}

impl FusedResults {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Summaries of the fused documents, in fused order, skipping documents
    /// without one.
    pub fn summaries(&self) -> Vec<&str> {
        self.documents
            .iter()
            .filter_map(|d| d.document.summary())
            .collect()
    }

    /// Per-signal contribution trace for the top `max_docs` documents.
    pub fn trace(&self, max_docs: usize) -> FusionTrace {
        let mut contributions: HashMap<&DocumentId, Vec<SignalContribution>> = HashMap::new();
        for (signal, ranking) in self.rankings.iter().enumerate() {
            for (rank, id) in ranking.iter().enumerate() {
                contributions.entry(id).or_default().push(SignalContribution {
                    signal,
                    rank: rank + 1,
                    score: rrf_contribution(rank),
                });
            }
        }

        let entries = self
            .documents
            .iter()
            .take(max_docs)
            .map(|fused| TraceEntry {
                summary: fused.document.summary().unwrap_or_default().to_string(),
                score: fused.score,
                contributions: contributions.remove(&fused.document.id).unwrap_or_default(),
            })
            .collect();

        FusionTrace { entries }
    }
}

/// Fuse per-query ranked lists with an intent-relevance ranking.
///
/// 1. Distinct documents are collected across the lists in first-encounter
///    order (the first copy of a document is kept).
/// 2. The intent list is those documents stably sorted by descending
///    summary relevance to `intent`.
/// 3. Every list, intent list included, contributes `1 / (60 + rank + 1)`.
pub fn fuse_with_intent(
    lists: &[RankedList],
    intent: Intent,
    relevance: &IntentRelevance,
) -> FusedResults {
    let mut distinct: Vec<&RetrievedDocument> = Vec::new();
    let mut by_id: HashMap<&DocumentId, &RetrievedDocument> = HashMap::new();
    let mut rankings: Vec<Vec<DocumentId>> = Vec::with_capacity(lists.len() + 1);

    for list in lists {
        let mut ranking = Vec::with_capacity(list.documents.len());
        for doc in &list.documents {
            if !by_id.contains_key(&doc.id) {
                by_id.insert(&doc.id, doc);
                distinct.push(doc);
            }
            ranking.push(doc.id.clone());
        }
        rankings.push(ranking);
    }

    let mut intent_order: Vec<(&RetrievedDocument, i64)> = distinct
        .iter()
        .map(|doc| {
            let summary = doc.summary().unwrap_or_default();
            (*doc, relevance.score_summary(summary, intent))
        })
        .collect();
    intent_order.sort_by(|a, b| b.1.cmp(&a.1));
    rankings.push(intent_order.iter().map(|(doc, _)| doc.id.clone()).collect());

    let documents = reciprocal_rank_fusion(&rankings)
        .into_iter()
        .filter_map(|(id, score)| {
            by_id.get(&id).map(|doc| FusedDocument {
                document: (*doc).clone(),
                score,
            })
        })
        .collect();

    FusedResults {
        intent,
        documents,
        rankings,
    }
}

/// Contribution of one ranking to a document's fused score.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalContribution {
    /// Index of the ranking; the intent list is the last one.
    pub signal: usize,
    /// 1-based rank within that ranking.
    pub rank: usize,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub summary: String,
    pub score: f64,
    pub contributions: Vec<SignalContribution>,
}

/// Debug view of how the top fused documents earned their scores.
#[derive(Debug, Clone)]
pub struct FusionTrace {
    pub entries: Vec<TraceEntry>,
}

impl fmt::Display for FusionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let summary: String = entry.summary.chars().take(140).collect();
            let ellipsis = if entry.summary.chars().count() > 140 { "..." } else { "" };
            writeln!(f, "{}{} (score {:.5})", summary, ellipsis, entry.score)?;
            for c in &entry.contributions {
                writeln!(
                    f,
                    "  signal {} -> rank {}, contribution {:.5}",
                    c.signal, c.rank, c.score
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use stockrag_core::{ContentType, DocumentMetadata, SummarySource};

    fn doc(key: &str, summary: &str) -> RetrievedDocument {
        let text = if summary.is_empty() {
            format!("Asset: ACME\nTitle: {}", key)
        } else {
            format!("Asset: ACME\nTitle: {}\nSummary: {}", key, summary)
        };
        RetrievedDocument {
            id: DocumentId::from_raw(key),
            text,
            metadata: DocumentMetadata {
                title: key.to_string(),
                source: "Wire".to_string(),
                source_url: format!("https://n.example/{}", key),
                published_at: Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap(),
                content_type: ContentType::News,
                symbol: "ACME".to_string(),
                summary_source: SummarySource::Feed,
            },
            similarity: 0.5,
        }
    }

    fn list(query: &str, docs: &[&RetrievedDocument]) -> RankedList {
        RankedList {
            query: query.to_string(),
            documents: docs.iter().map(|d| (*d).clone()).collect(),
        }
    }

    fn ids(fused: &FusedResults) -> Vec<&str> {
        fused.documents.iter().map(|d| d.document.id.as_str()).collect()
    }

    #[test]
    fn test_rrf_single_list_keeps_order() {
        let fused = reciprocal_rank_fusion(&[vec!["a", "b", "c"]]);
        let order: Vec<_> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-12);
        assert!((fused[2].1 - 1.0 / 63.0).abs() < 1e-12);
    }

    #[test]
    fn test_rrf_rank_zero_everywhere() {
        let rankings = vec![vec!["a", "b"], vec!["a"], vec!["a", "c"]];
        let fused = reciprocal_rank_fusion(&rankings);
        assert_eq!(fused[0].0, "a");
        assert!((fused[0].1 - 3.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_rrf_is_permutation_of_union() {
        let rankings = vec![vec![1, 2, 3], vec![3, 4], vec![], vec![5, 1]];
        let fused = reciprocal_rank_fusion(&rankings);
        let got: HashSet<_> = fused.iter().map(|(id, _)| *id).collect();
        let expected: HashSet<_> = rankings.iter().flatten().copied().collect();
        assert_eq!(fused.len(), expected.len());
        assert_eq!(got, expected);
    }

    #[test]
    fn test_rrf_ties_keep_first_encounter_order() {
        let rankings = vec![vec!["x", "y"], vec!["y", "x"]];
        let fused = reciprocal_rank_fusion(&rankings);
        assert_eq!(fused[0].0, "x");
        assert_eq!(fused[1].0, "y");
        assert_eq!(fused[0].1, fused[1].1);
    }

    #[test]
    fn test_rrf_empty() {
        let fused: Vec<(u32, f64)> = reciprocal_rank_fusion(&[]);
        assert!(fused.is_empty());
        let fused: Vec<(u32, f64)> = reciprocal_rank_fusion(&[vec![], vec![]]);
        assert!(fused.is_empty());
    }

    #[test]
    fn test_score_summary_for_intent() {
        assert_eq!(
            score_summary_for_intent("ACME rises and gains on strong demand", Intent::Performance),
            3
        );
        assert_eq!(
            score_summary_for_intent("ACME falls; IPO could add pressure", Intent::Performance),
            -4
        );
        // "rose" twice counts twice
        assert_eq!(score_summary_for_intent("Rose, then rose again", Intent::Performance), 2);
        assert_eq!(score_summary_for_intent("ACME rises strongly", Intent::Cause), 0);
        assert_eq!(score_summary_for_intent("ACME rises strongly", Intent::General), 0);
    }

    #[test]
    fn test_intent_list_promotes_positive_performance() {
        let flat = doc("flat", "ACME may see potential volatility");
        let up = doc("up", "ACME surges and gains");
        let lists = vec![list("q", &[&flat, &up])];

        // General intent: the intent list mirrors the query list
        let fused = fuse_with_intent(&lists, Intent::General, &IntentRelevance::default());
        assert_eq!(ids(&fused), vec!["flat", "up"]);

        // Performance intent: "up" leads the intent list, the scores tie and
        // first-encounter order keeps "flat" ahead
        let fused = fuse_with_intent(&lists, Intent::Performance, &IntentRelevance::default());
        assert_eq!(ids(&fused), vec!["flat", "up"]);
        assert_eq!(fused.documents[0].score, fused.documents[1].score);

        let lists = vec![list("q1", &[&flat, &up]), list("q2", &[&up])];
        let fused = fuse_with_intent(&lists, Intent::Performance, &IntentRelevance::default());
        assert_eq!(ids(&fused), vec!["up", "flat"]);
    }

    #[test]
    fn test_fusion_dedups_and_excludes_absent() {
        let a = doc("a", "ACME rises");
        let b = doc("b", "");
        let c = doc("c", "ACME falls");
        let lists = vec![list("q1", &[&a, &b]), list("q2", &[&b, &c]), list("q3", &[])];

        let fused = fuse_with_intent(&lists, Intent::Cause, &IntentRelevance::default());
        assert_eq!(fused.len(), 3);
        let got: HashSet<_> = ids(&fused).into_iter().collect();
        assert_eq!(got, HashSet::from(["a", "b", "c"]));
        let summaries = fused.summaries();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.contains(&"ACME rises"));
        assert!(summaries.contains(&"ACME falls"));
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let a = doc("a", "ACME rises");
        let b = doc("b", "ACME slides");
        let c = doc("c", "ACME jumps");
        let lists = vec![list("q1", &[&a, &b, &c]), list("q2", &[&c, &a])];

        let first = fuse_with_intent(&lists, Intent::Performance, &IntentRelevance::default());
        for _ in 0..10 {
            let again = fuse_with_intent(&lists, Intent::Performance, &IntentRelevance::default());
            assert_eq!(first.documents, again.documents);
        }
    }

    #[test]
    fn test_trace_lists_contributions() {
        let a = doc("a", "ACME rises");
        let b = doc("b", "ACME slides");
        let lists = vec![list("q1", &[&a, &b]), list("q2", &[&a])];
        let fused = fuse_with_intent(&lists, Intent::Performance, &IntentRelevance::default());

        let trace = fused.trace(1);
        assert_eq!(trace.entries.len(), 1);
        let top = &trace.entries[0];
        assert_eq!(top.summary, "ACME rises");
        // q1 rank 1, q2 rank 1, intent list rank 1
        assert_eq!(top.contributions.len(), 3);
        assert_eq!(top.contributions[2].signal, 2);
        let total: f64 = top.contributions.iter().map(|c| c.score).sum();
        assert!((total - top.score).abs() < 1e-12);
        assert!(trace.to_string().contains("signal 2 -> rank 1"));
    }
}
