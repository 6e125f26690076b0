//! Configuration types for the stockrag system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration for the stockrag system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockRagConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Text generation configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval and answer configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Intent keywords.
    #[serde(default)]
    pub intent: IntentConfig,

    /// Sentiment and relevance lexicons.
    #[serde(default)]
    pub lexicon: LexiconConfig,

    /// Ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: 30000,
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`.
    ///
    /// When the files are missing the feature-hashing embedder is used.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum tokens per input.
    #[serde(default = "default_embedding_max_tokens")]
    pub max_tokens: usize,

    /// Batch size for embedding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            dimension: 384,
            max_tokens: 256,
            batch_size: 32,
            num_threads: 4,
        }
    }
}

/// Text generation configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API base URL, without the `/chat/completions` suffix.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,

    /// Maximum completion tokens.
    #[serde(default = "default_completion_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Retrieval and answer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default lookback window in hours.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    /// Default number of results per expanded query.
    #[serde(default = "default_n_results")]
    pub n_results: usize,

    /// Maximum number of expanded queries, original included.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Maximum evidence items in an answer.
    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,

    /// Maximum news items in an answer.
    #[serde(default = "default_max_news")]
    pub max_news: usize,

    /// Time budget of the expansion generation call.
    #[serde(default = "default_expansion_timeout")]
    pub expansion_timeout_ms: u64,

    /// Time budget of each similarity search.
    #[serde(default = "default_search_timeout")]
    pub search_timeout_ms: u64,

    /// Time budget of the answer generation call.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 48,
            n_results: 5,
            max_queries: 5,
            max_evidence: 3,
            max_news: 5,
            expansion_timeout_ms: 20000,
            search_timeout_ms: 5000,
            generation_timeout_ms: 30000,
        }
    }
}

/// Keyword sets for intent classification, checked in field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default = "default_performance_keywords")]
    pub performance: Vec<String>,

    #[serde(default = "default_cause_keywords")]
    pub cause: Vec<String>,

    #[serde(default = "default_outlook_keywords")]
    pub outlook: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            performance: default_performance_keywords(),
            cause: default_cause_keywords(),
            outlook: default_outlook_keywords(),
        }
    }
}

/// Lexicons used for sentiment scoring and intent relevance.
///
/// Terms are matched as lower-case substrings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Positive sentiment terms and their weights.
    #[serde(default = "default_positive_weights")]
    pub positive: BTreeMap<String, i64>,

    /// Negative sentiment terms and their weights.
    #[serde(default = "default_negative_weights")]
    pub negative: BTreeMap<String, i64>,

    /// Hedging terms; each occurrence lowers the effective score by one.
    #[serde(default = "default_hedging_terms")]
    pub hedging: Vec<String>,

    /// Terms that raise performance relevance.
    #[serde(default = "default_performance_positive")]
    pub performance_positive: Vec<String>,

    /// Terms that lower performance relevance.
    #[serde(default = "default_performance_negative")]
    pub performance_negative: Vec<String>,

    /// Speculative terms that lower performance relevance.
    #[serde(default = "default_speculative_terms")]
    pub speculative: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            positive: default_positive_weights(),
            negative: default_negative_weights(),
            hedging: default_hedging_terms(),
            performance_positive: default_performance_positive(),
            performance_negative: default_performance_negative(),
            speculative: default_speculative_terms(),
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Summaries at least this similar to their title are treated as unusable.
    #[serde(default = "default_similarity_threshold")]
    pub summary_similarity_threshold: f64,

    /// Summaries shorter than this (after normalization) are treated as unusable.
    #[serde(default = "default_min_summary_chars")]
    pub min_summary_chars: usize,

    /// Default number of documents handled per backfill run.
    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            summary_similarity_threshold: 0.85,
            min_summary_chars: 40,
            backfill_limit: 5,
        }
    }
}

// Default value functions

fn default_busy_timeout() -> u32 {
    30000
}

fn default_dimension() -> usize {
    384
}

fn default_embedding_max_tokens() -> usize {
    256
}

fn default_batch_size() -> usize {
    32
}

fn default_num_threads() -> usize {
    4
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_completion_tokens() -> u32 {
    1024
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_lookback_hours() -> u32 {
    48
}

fn default_n_results() -> usize {
    5
}

fn default_max_queries() -> usize {
    5
}

fn default_max_evidence() -> usize {
    3
}

fn default_max_news() -> usize {
    5
}

fn default_expansion_timeout() -> u64 {
    20000
}

fn default_search_timeout() -> u64 {
    5000
}

fn default_generation_timeout() -> u64 {
    30000
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_min_summary_chars() -> usize {
    40
}

fn default_backfill_limit() -> u32 {
    5
}

fn strings(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

fn weights(terms: &[(&str, i64)]) -> BTreeMap<String, i64> {
    terms.iter().map(|(t, w)| (t.to_string(), *w)).collect()
}

fn default_performance_keywords() -> Vec<String> {
    strings(&["perform", "performance", "today", "now"])
}

fn default_cause_keywords() -> Vec<String> {
    strings(&["why", "reason", "cause"])
}

fn default_outlook_keywords() -> Vec<String> {
    strings(&["outlook", "future", "expect"])
}

fn default_positive_weights() -> BTreeMap<String, i64> {
    weights(&[
        ("rises", 2),
        ("rose", 2),
        ("gains", 2),
        ("surges", 3),
        ("jumps", 2),
        ("upgrades", 3),
        ("raises target", 3),
        ("bullish", 2),
        ("strong", 1),
        ("growth", 1),
        ("optimism", 1),
    ])
}

fn default_negative_weights() -> BTreeMap<String, i64> {
    weights(&[
        ("slides", 2),
        ("falls", 2),
        ("fell", 2),
        ("drops", 2),
        ("declines", 2),
        ("pressure", 1),
        ("concerns", 1),
        ("uncertainty", 1),
        ("scrutiny", 1),
        ("weakness", 1),
        ("selloff", 3),
    ])
}

fn default_hedging_terms() -> Vec<String> {
    strings(&["could", "might", "may", "potential", "possibly"])
}

fn default_performance_positive() -> Vec<String> {
    strings(&[
        "rises",
        "rose",
        "gains",
        "surges",
        "jumps",
        "upgrades",
        "raises target",
        "bullish",
        "strong",
        "optimism",
        "growth",
    ])
}

fn default_performance_negative() -> Vec<String> {
    strings(&[
        "slides",
        "falls",
        "fell",
        "drops",
        "declines",
        "pressure",
        "jitters",
        "concerns",
        "uncertainty",
        "scrutiny",
        "weakness",
        "selloff",
    ])
}

fn default_speculative_terms() -> Vec<String> {
    strings(&["could", "might", "may", "potential", "possibly", "ipo"])
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockrag")
        .join("stockrag.db")
}

fn default_model_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockrag")
        .join("models")
        .join("all-MiniLM-L6-v2")
}

impl StockRagConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::StockRagError::Config {
                message: format!("Failed to parse config: {}", e),
            }
        })?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("stockrag").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("stockrag.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StockRagConfig::default();
        assert_eq!(config.retrieval.lookback_hours, 48);
        assert_eq!(config.retrieval.max_queries, 5);
        assert_eq!(config.retrieval.max_evidence, 3);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_default_lexicon_weights() {
        let lexicon = LexiconConfig::default();
        assert_eq!(lexicon.positive.get("surges"), Some(&3));
        assert_eq!(lexicon.positive.get("raises target"), Some(&3));
        assert_eq!(lexicon.negative.get("selloff"), Some(&3));
        assert_eq!(lexicon.negative.get("pressure"), Some(&1));
        assert!(lexicon.speculative.iter().any(|t| t == "ipo"));
        assert!(!lexicon.hedging.iter().any(|t| t == "ipo"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[retrieval]\nlookback_hours = 120\n\n[lexicon.positive]\nsoars = 3\n\n[llm]\nmodel = \"local\""
        )
        .unwrap();

        let config = StockRagConfig::load(file.path()).unwrap();
        assert_eq!(config.retrieval.lookback_hours, 120);
        assert_eq!(config.retrieval.n_results, 5);
        assert_eq!(config.lexicon.positive.len(), 1);
        assert_eq!(config.lexicon.positive.get("soars"), Some(&3));
        assert_eq!(config.lexicon.negative.get("selloff"), Some(&3));
        assert_eq!(config.llm.model, "local");
        assert_eq!(config.llm.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval\nlookback_hours = ").unwrap();

        let err = StockRagConfig::load(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
