//! Ingestion boundary: raw news records into typed documents.
//!
//! Providers disagree on field names and date formats. Everything is
//! normalized here, once, so the rest of the system only sees
//! [`DocumentMetadata`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use stockrag_core::{
    render_news_text, ContentType, Document, DocumentMetadata, IngestConfig, Result,
    StockRagError, SummarySource, DATE_FORMAT,
};

/// A news record as delivered by a feed or provider export.
///
/// Providers name the same field differently, and some exports carry
/// several spellings at once. Each spelling is its own field; the first
/// usable one wins, in declaration order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewsRecord {
    #[serde(default)]
    pub symbol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub summary: Option<String>,

    /// Pre-rendered text (price and macro snapshots).
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default)]
    pub source_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// RFC 3339, `%Y-%m-%d %H:%M:%S`, RFC 2822 or Unix seconds.
    #[serde(default)]
    pub published: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Value>,

    #[serde(default)]
    pub content_type: Option<ContentType>,

    #[serde(default)]
    pub summary_source: Option<String>,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Records read.
    pub received: usize,

    /// Records that could not become documents.
    pub rejected: usize,

    /// Distinct document identities in the batch.
    pub unique: usize,

    /// Newly stored documents.
    pub inserted: usize,

    /// Identities that were already stored.
    pub skipped: usize,

    /// Distinct documents whose summary awaits a headline summary.
    pub needs_summary: usize,
}

/// Records parsed from an input file.
#[derive(Debug, Clone, Default)]
pub struct ParsedRecords {
    pub records: Vec<NewsRecord>,

    /// JSON lines that could not be read as a record.
    pub malformed: usize,
}

/// Decides whether a feed summary is good enough to keep.
#[derive(Debug, Clone)]
pub struct SummaryCheck {
    threshold: f64,
    min_chars: usize,
}

impl SummaryCheck {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            threshold: config.summary_similarity_threshold,
            min_chars: config.min_summary_chars,
        }
    }

    /// True when the summary is empty, mostly repeats the title, or is too
    /// short to carry information.
    ///
    /// The last two words of the summary are ignored; feeds tend to append
    /// the publisher name.
    pub fn needs_llm_summary(&self, title: &str, summary: &str) -> bool {
        if summary.trim().is_empty() {
            return true;
        }

        let title = normalize(title);
        let summary = drop_trailing_words(&normalize(summary), 2);

        if strsim::normalized_levenshtein(&title, &summary) > self.threshold {
            return true;
        }

        summary.chars().count() < self.min_chars
    }
}

impl Default for SummaryCheck {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

/// Lower-case, strip punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop up to `n` trailing words, always keeping the first one.
fn drop_trailing_words(text: &str, n: usize) -> String {
    let words: Vec<&str> = text.split(' ').collect();
    let keep = words.len().saturating_sub(n).max(1);
    words[..keep.min(words.len())].join(" ")
}

/// Parse a provider date value.
///
/// Strings may be RFC 3339, `%Y-%m-%d %H:%M:%S` (taken as UTC), RFC 2822 or
/// Unix seconds; numbers are Unix seconds.
pub fn parse_published(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, DATE_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// First candidate that is present and not blank, trimmed.
fn first_text<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
}

impl NewsRecord {
    /// Turn the record into a document.
    ///
    /// Missing or unparseable dates fall back to `now`. A summary that fails
    /// the check is blanked and marked for backfill.
    pub fn into_document(self, check: &SummaryCheck, now: DateTime<Utc>) -> Result<Document> {
        let symbol = first_text(&[Some(self.symbol.as_str()), self.ticker.as_deref()])
            .map(str::to_uppercase)
            .ok_or_else(|| StockRagError::invalid_document("record has no symbol"))?;

        let content_type = self.content_type.unwrap_or(ContentType::News);
        let title = self.title.trim().to_string();
        let source = first_text(&[self.source.as_deref(), self.publisher.as_deref()])
            .unwrap_or("Unknown")
            .to_string();

        let source_url = match first_text(&[
            self.source_url.as_deref(),
            self.url.as_deref(),
            self.link.as_deref(),
        ]) {
            Some(url) => url.to_string(),
            None if content_type != ContentType::News => source.clone(),
            None => {
                return Err(StockRagError::invalid_document(format!(
                    "{} news record '{}' has no source_url",
                    symbol, title
                )))
            }
        };

        let dates = [&self.published, &self.timestamp, &self.date];
        let published_at = dates
            .iter()
            .filter_map(|value| value.as_ref())
            .find_map(|value| {
                let parsed = parse_published(value);
                if parsed.is_none() {
                    debug!("Unparseable date {} for '{}'", value, title);
                }
                parsed
            })
            .unwrap_or(now);

        let declared = self
            .summary_source
            .as_deref()
            .map(SummarySource::from_label);

        let (text, summary_source) = match (self.summary, self.text) {
            (None, Some(text)) if !text.trim().is_empty() => {
                (text.trim().to_string(), declared.unwrap_or(SummarySource::Provider))
            }
            (summary, _) => {
                if title.is_empty() {
                    return Err(StockRagError::invalid_document(format!(
                        "{} record has neither title nor text",
                        symbol
                    )));
                }
                let summary = summary.unwrap_or_default();
                if check.needs_llm_summary(&title, &summary) {
                    (render_news_text(&symbol, &title, ""), SummarySource::NeedsLlm)
                } else {
                    (
                        render_news_text(&symbol, &title, &summary),
                        declared.unwrap_or(SummarySource::Feed),
                    )
                }
            }
        };

        Ok(Document::new(
            text,
            DocumentMetadata {
                title,
                source,
                source_url,
                published_at,
                content_type,
                symbol,
                summary_source,
            },
        ))
    }
}

/// Parse a JSON array of records, or one record per line.
///
/// A malformed array fails as a whole. In line mode a bad line is counted
/// and skipped.
pub fn parse_records(input: &str) -> Result<ParsedRecords> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') {
        return Ok(ParsedRecords {
            records: serde_json::from_str(trimmed)?,
            malformed: 0,
        });
    }

    let mut parsed = ParsedRecords::default();
    for (n, line) in trimmed.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                warn!("Skipping malformed line {}: {}", n + 1, e);
                parsed.malformed += 1;
            }
        }
    }
    Ok(parsed)
}

/// Convert records into documents, one per identity.
///
/// Invalid records are dropped with a warning. When two records share an
/// identity the later one wins; first-seen order is kept.
pub fn prepare_documents(
    records: Vec<NewsRecord>,
    check: &SummaryCheck,
    now: DateTime<Utc>,
) -> (Vec<Document>, IngestReport) {
    let mut report = IngestReport {
        received: records.len(),
        ..IngestReport::default()
    };

    let mut docs: Vec<Document> = Vec::with_capacity(records.len());
    let mut positions = HashMap::new();

    for record in records {
        match record.into_document(check, now) {
            Ok(doc) => match positions.get(&doc.id) {
                Some(&i) => docs[i] = doc,
                None => {
                    positions.insert(doc.id.clone(), docs.len());
                    docs.push(doc);
                }
            },
            Err(e) => {
                warn!("Rejected record: {}", e);
                report.rejected += 1;
            }
        }
    }

    report.unique = docs.len();
    report.needs_summary = docs
        .iter()
        .filter(|d| d.metadata.summary_source == SummarySource::NeedsLlm)
        .count();
    (docs, report)
}
