//! Weighted lexical sentiment with a hedging penalty.

use serde::Serialize;

use stockrag_core::{Confidence, LexiconConfig, Sentiment};

/// Raw numbers behind a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SentimentBreakdown {
    /// Weighted positive hits minus weighted negative hits.
    pub score: i64,
    /// Total hedging term occurrences.
    pub hedge_penalty: i64,
    /// `|score| - hedge_penalty`.
    pub effective: i64,
    /// Number of summaries scored.
    pub summaries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SentimentVerdict {
    pub label: Sentiment,
    pub confidence: Confidence,
    pub breakdown: SentimentBreakdown,
}

/// Scores summaries against weighted lexicons.
///
/// Terms are counted as non-overlapping substrings of each lower-cased
/// summary.
#[derive(Debug, Clone)]
pub struct SentimentScorer {
    positive: Vec<(String, i64)>,
    negative: Vec<(String, i64)>,
    hedging: Vec<String>,
}

impl SentimentScorer {
    pub fn new(lexicon: &LexiconConfig) -> Self {
        let weighted = |terms: &std::collections::BTreeMap<String, i64>| {
            terms
                .iter()
                .filter(|(t, _)| !t.is_empty())
                .map(|(t, w)| (t.to_lowercase(), *w))
                .collect()
        };
        Self {
            positive: weighted(&lexicon.positive),
            negative: weighted(&lexicon.negative),
            hedging: lexicon
                .hedging
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    /// Signed lexical score over all summaries.
    pub fn sentiment_score(&self, summaries: &[&str]) -> i64 {
        summaries
            .iter()
            .map(|s| {
                let text = s.to_lowercase();
                weighted_hits(&text, &self.positive) - weighted_hits(&text, &self.negative)
            })
            .sum()
    }

    /// Total occurrences of hedging terms over all summaries.
    pub fn hedge_penalty(&self, summaries: &[&str]) -> i64 {
        summaries
            .iter()
            .map(|s| {
                let text = s.to_lowercase();
                self.hedging
                    .iter()
                    .map(|t| text.matches(t.as_str()).count() as i64)
                    .sum::<i64>()
            })
            .sum()
    }

    /// Label and confidence for a set of summaries.
    ///
    /// Label: Positive at score >= 3, Negative at score <= -3, else Mixed.
    /// Confidence: High when effective >= 5 over at least 3 summaries, Medium
    /// when effective >= 3 over at least 2, else Low.
    pub fn score(&self, summaries: &[&str]) -> SentimentVerdict {
        let score = self.sentiment_score(summaries);
        let hedge_penalty = self.hedge_penalty(summaries);
        let effective = score.abs() - hedge_penalty;
        let count = summaries.len();

        let label = if score >= 3 {
            Sentiment::Positive
        } else if score <= -3 {
            Sentiment::Negative
        } else {
            Sentiment::Mixed
        };

        let confidence = if effective >= 5 && count >= 3 {
            Confidence::High
        } else if effective >= 3 && count >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        SentimentVerdict {
            label,
            confidence,
            breakdown: SentimentBreakdown {
                score,
                hedge_penalty,
                effective,
                summaries: count,
            },
        }
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(&LexiconConfig::default())
    }
}

fn weighted_hits(text: &str, terms: &[(String, i64)]) -> i64 {
    terms
        .iter()
        .map(|(term, weight)| weight * text.matches(term.as_str()).count() as i64)
        .sum()
}
