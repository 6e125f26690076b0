//! Server facade over ingestion, backfill and question answering.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockrag_core::{
    AnswerResponse, DocumentStore, Embedder, Result, StockRagConfig, StockRagError,
    SummarySource, TextGenerator,
};
use stockrag_embed::{embedder_from_config, HashingEmbedder};
use stockrag_llm::build_generator;
use stockrag_query::{headline_summary_prompt, AnswerRequest, QueryEngine};
use stockrag_store::{DocumentIndex, SqliteStore};

use crate::ingest::{parse_records, prepare_documents, IngestReport, NewsRecord, SummaryCheck};

type Index = DocumentIndex<SqliteStore, dyn Embedder>;

/// stockrag server state.
pub struct StockRagServer {
    config: StockRagConfig,

    /// Embedding-backed document index.
    index: Arc<Index>,

    /// Generator shared with the engine, also used for backfill.
    generator: Arc<dyn TextGenerator>,

    /// Query engine.
    engine: QueryEngine,

    summary_check: SummaryCheck,
}

/// Question parameters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AskParams {
    /// The question.
    pub question: String,

    /// Restrict to one asset symbol (optional).
    pub symbol: Option<String>,

    /// Lookback window in hours (default from config).
    pub hours: Option<u32>,

    /// Results per expanded query (default from config).
    pub results: Option<usize>,
}

impl AskParams {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Documents picked up.
    pub attempted: usize,

    /// Documents rewritten with a headline summary.
    pub updated: usize,
}

/// Tool result.
#[derive(Debug, Serialize)]
pub struct ToolResult {
    /// Whether the operation was successful.
    pub success: bool,

    /// Result message or content.
    pub message: String,
}

impl ToolResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl StockRagServer {
    /// Create a server from configuration: file-backed store, ONNX embedder
    /// when the model is installed, HTTP generator when an API key is set.
    pub fn new(config: StockRagConfig) -> Result<Self> {
        info!("Initializing stockrag with database at {:?}", config.database.path);

        let store = Arc::new(SqliteStore::from_config(&config.database)?);
        let embedder = embedder_from_config(&config.embedding);
        let generator = build_generator(&config.llm);
        Ok(Self::with_parts(config, store, embedder, generator))
    }

    /// Create a server over an in-memory database with the hashing embedder.
    pub fn new_memory_with(generator: Arc<dyn TextGenerator>) -> Result<Self> {
        info!("Initializing stockrag with in-memory database");

        let config = StockRagConfig::default();
        let store = Arc::new(SqliteStore::open_memory()?);
        let embedder: Arc<dyn Embedder> =
            Arc::new(HashingEmbedder::new(config.embedding.dimension));
        Ok(Self::with_parts(config, store, embedder, generator))
    }

    /// Assemble a server from its collaborators.
    pub fn with_parts(
        config: StockRagConfig,
        store: Arc<SqliteStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let index: Arc<Index> = Arc::new(DocumentIndex::new(store, embedder));
        let engine = QueryEngine::new(index.clone(), generator.clone(), &config);
        let summary_check = SummaryCheck::new(&config.ingest);

        Self {
            config,
            index,
            generator,
            engine,
            summary_check,
        }
    }

    pub fn config(&self) -> &StockRagConfig {
        &self.config
    }

    /// Answer a question and render it as text.
    pub async fn ask(&self, params: AskParams) -> ToolResult {
        match self.ask_json(params).await {
            Ok(response) => ToolResult::success(render_answer(&response)),
            Err(e) => ToolResult::error(format!("Question failed: {}", e)),
        }
    }

    /// Answer a question, returning the structured response.
    pub async fn ask_json(&self, params: AskParams) -> Result<AnswerResponse> {
        let defaults = &self.config.retrieval;
        let mut request = AnswerRequest::with_defaults(params.question, defaults)
            .lookback_hours(params.hours.unwrap_or(defaults.lookback_hours))
            .n_results(params.results.unwrap_or(defaults.n_results));
        if let Some(symbol) = params.symbol {
            request = request.symbol(symbol);
        }

        self.engine.answer(&request).await
    }

    /// Ingest a JSON (array or lines) news file.
    pub async fn ingest(&self, path: &Path) -> ToolResult {
        info!("Ingesting {:?}", path);

        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read {:?}: {}", path, e)),
        };

        let parsed = match parse_records(&content) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Failed to parse {:?}: {}", path, e)),
        };

        match self.ingest_records(parsed.records).await {
            Ok(mut report) => {
                report.received += parsed.malformed;
                report.rejected += parsed.malformed;
                ToolResult::success(format!(
                    "Ingested {:?}: {} records, {} unique, {} new, {} already stored, \
                     {} rejected, {} awaiting a headline summary.",
                    path,
                    report.received,
                    report.unique,
                    report.inserted,
                    report.skipped,
                    report.rejected,
                    report.needs_summary
                ))
            }
            Err(e) => ToolResult::error(format!("Ingestion failed: {}", e)),
        }
    }

    /// Normalize, de-duplicate and index a batch of records.
    pub async fn ingest_records(&self, records: Vec<NewsRecord>) -> Result<IngestReport> {
        let (docs, mut report) = prepare_documents(records, &self.summary_check, Utc::now());

        report.inserted = self.index.add_documents(&docs).await?;
        report.skipped = report.unique.saturating_sub(report.inserted);

        info!(
            "Ingested {} records: {} new, {} skipped",
            report.received, report.inserted, report.skipped
        );
        Ok(report)
    }

    /// Generate headline summaries for documents whose feed summary was
    /// unusable. `None` uses the configured limit.
    pub async fn backfill_summaries(&self, limit: Option<u32>) -> ToolResult {
        match self.backfill(limit.unwrap_or(self.config.ingest.backfill_limit)).await {
            Ok(report) if report.attempted == 0 => {
                ToolResult::success("No documents need a headline summary.")
            }
            Ok(report) => ToolResult::success(format!(
                "Stored {} of {} headline summaries.",
                report.updated, report.attempted
            )),
            Err(e) => ToolResult::error(format!("Backfill failed: {}", e)),
        }
    }

    /// Backfill up to `limit` documents. Upstream failures (generation
    /// errors, timeouts) skip the document; anything else aborts.
    pub async fn backfill(&self, limit: u32) -> Result<BackfillReport> {
        let pending = self.index.store().documents_needing_summary(limit).await?;
        let timeout = Duration::from_millis(self.config.retrieval.generation_timeout_ms);

        let mut report = BackfillReport {
            attempted: pending.len(),
            ..BackfillReport::default()
        };

        for doc in pending {
            let title = doc.title().to_string();
            let prompt = headline_summary_prompt(&title, &doc.metadata.source, &doc.metadata.date());

            let reply = tokio::time::timeout(timeout, self.generator.generate(&prompt))
                .await
                .unwrap_or_else(|_| {
                    Err(StockRagError::timeout("headline summary", timeout.as_millis() as u64))
                });

            let summary = match reply {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => {
                    warn!("Empty headline summary for '{}'", title);
                    continue;
                }
                Err(e) if e.is_upstream() => {
                    warn!("Headline summary failed for '{}': {}", title, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let updated = doc.with_summary(&summary, SummarySource::LlmHeadline);
            self.index.reprocess(&updated).await?;
            report.updated += 1;
            info!("Stored headline summary for '{}'", title);
        }

        Ok(report)
    }

    /// Delete every document of a symbol.
    pub async fn remove_symbol(&self, symbol: &str) -> ToolResult {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return ToolResult::error(
                StockRagError::invalid_argument("symbol must not be empty").to_string(),
            );
        }

        info!("Removing documents for {}", symbol);

        match self.index.store().delete_symbol(symbol).await {
            Ok(0) => ToolResult::success(format!("No documents stored for {}.", symbol.to_uppercase())),
            Ok(n) => ToolResult::success(format!(
                "Removed {} documents for {}.",
                n,
                symbol.to_uppercase()
            )),
            Err(e) => ToolResult::error(format!("Failed to remove {}: {}", symbol, e)),
        }
    }

    /// Get statistics.
    pub async fn stats(&self, symbol: Option<&str>) -> ToolResult {
        match self.index.store().get_stats(symbol).await {
            Ok(stats) => {
                let mut output = String::new();

                if let Some(sym) = stats.filter.as_deref() {
                    output.push_str(&format!("Statistics for {}:\n\n", sym));
                } else {
                    output.push_str("Overall statistics:\n\n");
                }

                output.push_str(&format!("- Documents: {}\n", stats.documents));
                output.push_str(&format!("- Embedded: {}\n", stats.embedded));
                output.push_str(&format!("- Symbols: {}\n", stats.symbols));
                output.push_str(&format!("- Awaiting summary: {}\n", stats.needs_summary));
                output.push_str(&format!(
                    "- Storage: {:.2} MB\n",
                    stats.storage_bytes as f64 / 1024.0 / 1024.0
                ));

                ToolResult::success(output)
            }
            Err(e) => ToolResult::error(format!("Failed to get stats: {}", e)),
        }
    }
}

/// Render an answer with its sentiment, evidence and news list.
pub fn render_answer(response: &AnswerResponse) -> String {
    let mut output = format!(
        "{}\n\nOverall sentiment: {}\nConfidence level: {}\n",
        response.answer.trim(),
        response.sentiment,
        response.confidence
    );

    if !response.evidence.is_empty() {
        output.push_str("\nKey evidence:\n");
        for evidence in &response.evidence {
            output.push_str(&format!("- {} ({})\n", evidence.summary, evidence.source_url));
        }
    }

    if !response.news.is_empty() {
        output.push_str("\nRecent news:\n");
        for item in &response.news {
            output.push_str(&format!(
                "- [{}] {} ({})\n  {}\n",
                item.timestamp, item.title, item.source, item.url
            ));
        }
    }

    output
}
