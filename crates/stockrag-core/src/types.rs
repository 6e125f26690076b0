//! Core domain types for the stockrag system.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::text::{extract_summary, extract_title, render_news_text};

/// Date format used for the `date` field of documents and news items.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of content a document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// A news article headline and summary.
    News,
    /// A price movement snapshot.
    Price,
    /// A macro market snapshot (commodities, currencies).
    Macro,
}

impl ContentType {
    /// Parse a stored label, falling back to news.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "price" => Self::Price,
            "macro" => Self::Macro,
            _ => Self::News,
        }
    }

    /// Stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Price => "price",
            Self::Macro => "macro",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the summary line of a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    /// Taken from the feed entry.
    #[serde(rename = "rss")]
    Feed,
    /// Supplied by a provider API that already summarizes.
    #[serde(rename = "api")]
    Provider,
    /// The feed summary was unusable; waiting for a headline summary.
    NeedsLlm,
    /// Generated from the headline during backfill.
    LlmHeadline,
}

impl SummarySource {
    /// Parse a stored label, falling back to feed.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "api" => Self::Provider,
            "needs_llm" => Self::NeedsLlm,
            "llm_headline" => Self::LlmHeadline,
            _ => Self::Feed,
        }
    }

    /// Stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "rss",
            Self::Provider => "api",
            Self::NeedsLlm => "needs_llm",
            Self::LlmHeadline => "llm_headline",
        }
    }
}

impl std::fmt::Display for SummarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-derived document identity.
///
/// Blake3 digest (hex) of the canonical source URL, the upper-cased symbol
/// and an optional discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Derive the identity of a document.
    pub fn derive(source_url: &str, symbol: &str, discriminator: Option<&str>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(source_url.trim().as_bytes());
        hasher.update(b"\n");
        hasher.update(symbol.trim().to_uppercase().as_bytes());
        if let Some(extra) = discriminator {
            hasher.update(b"\n");
            hasher.update(extra.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Wrap an already-derived identifier (e.g. read back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed document metadata.
///
/// Alternate field names used by upstream providers are resolved before a
/// value of this type exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Headline or title.
    pub title: String,

    /// Publisher name.
    pub source: String,

    /// Canonical link to the article (or provider name for snapshots).
    pub source_url: String,

    /// Publish time.
    pub published_at: DateTime<Utc>,

    /// Kind of content.
    pub content_type: ContentType,

    /// Upper-cased asset symbol.
    pub symbol: String,

    /// Origin of the summary line.
    pub summary_source: SummarySource,
}

impl DocumentMetadata {
    /// Publish time rendered as `%Y-%m-%d %H:%M:%S`.
    pub fn date(&self) -> String {
        self.published_at.format(DATE_FORMAT).to_string()
    }

    /// Publish time as Unix seconds.
    pub fn timestamp(&self) -> i64 {
        self.published_at.timestamp()
    }
}

/// A document in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Content-derived identifier.
    pub id: DocumentId,

    /// Line-oriented document text.
    pub text: String,

    /// Structured metadata.
    pub metadata: DocumentMetadata,

    /// Blake3 hash of the text.
    #[serde(with = "serde_bytes_opt")]
    pub content_hash: Option<[u8; 32]>,

    /// First ingestion time.
    pub ingested_at: DateTime<Utc>,

    /// Last reprocessing time.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document, deriving its identity from the metadata.
    pub fn new(text: impl Into<String>, mut metadata: DocumentMetadata) -> Self {
        metadata.symbol = metadata.symbol.trim().to_uppercase();
        let discriminator = match metadata.content_type {
            ContentType::News => None,
            ContentType::Price | ContentType::Macro => {
                Some(metadata.published_at.format("%Y-%m-%d").to_string())
            }
        };
        let id = DocumentId::derive(
            &metadata.source_url,
            &metadata.symbol,
            discriminator.as_deref(),
        );
        let text = text.into();
        let now = Utc::now();

        Self {
            id,
            content_hash: Some(*blake3::hash(text.as_bytes()).as_bytes()),
            text,
            metadata,
            ingested_at: now,
            updated_at: now,
        }
    }

    /// Extracted summary, if the text carries one.
    pub fn summary(&self) -> Option<&str> {
        extract_summary(&self.text)
    }

    /// Headline from the text, falling back to the metadata title.
    pub fn title(&self) -> &str {
        extract_title(&self.text).unwrap_or(&self.metadata.title)
    }

    /// Reprocess the document with a new summary line.
    ///
    /// The identity is kept; text, hash, summary source and update time change.
    pub fn with_summary(mut self, summary: &str, source: SummarySource) -> Self {
        let title = self.title().to_string();
        self.text = render_news_text(&self.metadata.symbol, &title, summary);
        self.content_hash = Some(*blake3::hash(self.text.as_bytes()).as_bytes());
        self.metadata.summary_source = source;
        self.updated_at = Utc::now();
        self
    }
}

/// A document returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Document identity.
    pub id: DocumentId,

    /// Document text.
    pub text: String,

    /// Document metadata.
    pub metadata: DocumentMetadata,

    /// Similarity to the query (higher is better).
    pub similarity: f32,
}

impl RetrievedDocument {
    /// Extracted summary, if the text carries one.
    pub fn summary(&self) -> Option<&str> {
        extract_summary(&self.text)
    }
}

/// Restriction applied to every similarity search of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    /// Only documents published at or after this instant are eligible.
    pub cutoff: DateTime<Utc>,

    /// Only documents of this symbol are eligible.
    pub symbol: Option<String>,
}

impl SearchFilter {
    /// Build a filter for a lookback window ending at `now`.
    ///
    /// The cutoff saturates at the Unix epoch.
    pub fn lookback(hours: u32, now: DateTime<Utc>, symbol: Option<&str>) -> Self {
        let epoch = Utc.timestamp_opt(0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC);
        let cutoff = now
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .unwrap_or(epoch)
            .max(epoch);

        Self {
            cutoff,
            symbol: symbol
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
        }
    }

    /// Cutoff as Unix seconds (never negative).
    pub fn cutoff_timestamp(&self) -> i64 {
        self.cutoff.timestamp().max(0)
    }
}

/// Overall sentiment label of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Mixed,
    /// Only used when there was no evidence to score.
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Mixed => "Mixed",
            Self::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

/// Confidence tier of a sentiment verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

/// A summary backing an answer, with its link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub summary: String,
    pub source_url: String,
}

/// A news item listed alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    /// Publish date, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    pub source: String,
}

impl From<&RetrievedDocument> for NewsItem {
    fn from(doc: &RetrievedDocument) -> Self {
        Self {
            title: doc.metadata.title.clone(),
            url: doc.metadata.source_url.clone(),
            timestamp: doc.metadata.date(),
            source: doc.metadata.source.clone(),
        }
    }
}

/// Structured answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sentiment: Sentiment,
    pub confidence: Confidence,
    pub evidence: Vec<Evidence>,
    pub news: Vec<NewsItem>,
}

impl AnswerResponse {
    /// Fixed neutral, low-confidence response used when there is nothing to
    /// ground an answer on.
    pub fn insufficient(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sentiment: Sentiment::Neutral,
            confidence: Confidence::Low,
            evidence: Vec::new(),
            news: Vec::new(),
        }
    }
}

/// Statistics about the document index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    /// Number of documents.
    pub documents: u64,

    /// Number of documents with an embedding.
    pub embedded: u64,

    /// Number of distinct symbols.
    pub symbols: u64,

    /// Documents waiting for a headline summary.
    pub needs_summary: u64,

    /// Database size in bytes.
    pub storage_bytes: u64,

    /// Optional symbol filter applied.
    pub filter: Option<String>,
}

/// Helper module for optional byte array serialization.
mod serde_bytes_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => {
                let hex = hex::encode(bytes);
                hex.serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(hex) => {
                let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("invalid hash length"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(url: &str, symbol: &str, content_type: ContentType) -> DocumentMetadata {
        DocumentMetadata {
            title: "ACME jumps".to_string(),
            source: "Wire".to_string(),
            source_url: url.to_string(),
            published_at: Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 0).unwrap(),
            content_type,
            symbol: symbol.to_string(),
            summary_source: SummarySource::Feed,
        }
    }

    #[test]
    fn test_document_id_is_stable_and_symbol_aware() {
        let a = DocumentId::derive("https://news.example/a", "acme", None);
        let b = DocumentId::derive("https://news.example/a", "ACME", None);
        let c = DocumentId::derive("https://news.example/a", "INITECH", None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_price_documents_are_keyed_by_day() {
        let mut meta = metadata("alphavantage", "acme", ContentType::Price);
        let monday = Document::new("ACME stock rose 1.00%", meta.clone());
        meta.published_at = meta.published_at + Duration::days(1);
        let tuesday = Document::new("ACME stock rose 2.00%", meta);
        assert_ne!(monday.id, tuesday.id);
        assert_eq!(monday.metadata.symbol, "ACME");
    }

    #[test]
    fn test_document_summary_and_reprocess() {
        let text = render_news_text("ACME", "ACME jumps", "");
        let doc = Document::new(text, metadata("https://news.example/a", "ACME", ContentType::News));
        assert_eq!(doc.summary(), None);

        let id = doc.id.clone();
        let updated = doc.with_summary("ACME gains after upgrade.", SummarySource::LlmHeadline);
        assert_eq!(updated.id, id);
        assert_eq!(updated.summary(), Some("ACME gains after upgrade."));
        assert_eq!(updated.title(), "ACME jumps");
        assert_eq!(updated.metadata.summary_source, SummarySource::LlmHeadline);
        assert_eq!(
            updated.content_hash,
            Some(*blake3::hash(updated.text.as_bytes()).as_bytes())
        );
    }

    #[test]
    fn test_metadata_date_format() {
        let meta = metadata("u", "ACME", ContentType::News);
        assert_eq!(meta.date(), "2026-10-15 09:30:00");
    }

    #[test]
    fn test_lookback_filter_saturates_at_epoch() {
        let now = Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap();
        let filter = SearchFilter::lookback(48, now, Some(" acme "));
        assert_eq!(filter.cutoff_timestamp(), 0);
        assert_eq!(filter.symbol.as_deref(), Some("ACME"));

        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let filter = SearchFilter::lookback(48, now, None);
        assert_eq!(filter.cutoff, Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap());
        assert!(filter.symbol.is_none());
    }

    #[test]
    fn test_labels_round_trip() {
        for ct in [ContentType::News, ContentType::Price, ContentType::Macro] {
            assert_eq!(ContentType::from_label(ct.as_str()), ct);
        }
        for src in [
            SummarySource::Feed,
            SummarySource::Provider,
            SummarySource::NeedsLlm,
            SummarySource::LlmHeadline,
        ] {
            assert_eq!(SummarySource::from_label(src.as_str()), src);
        }
    }

    #[test]
    fn test_insufficient_response() {
        let response = AnswerResponse::insufficient("nothing");
        assert_eq!(response.sentiment, Sentiment::Neutral);
        assert_eq!(response.confidence, Confidence::Low);
        assert!(response.evidence.is_empty());
        assert!(response.news.is_empty());
    }
}
