//! Question answering pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, Level};

use stockrag_core::{
    AnswerResponse, Result, RetrievalConfig, SearchFilter, SimilaritySearch, StockRagConfig,
    StockRagError, TextGenerator,
};

use crate::evidence::{select_evidence, select_news};
use crate::expansion::QueryExpander;
use crate::fusion::{fuse_with_intent, IntentRelevance};
use crate::intent::IntentClassifier;
use crate::retriever::MultiQueryRetriever;
use crate::sentiment::SentimentScorer;
use crate::synth::AnswerSynthesizer;

/// Answer when no search returned anything.
pub const NO_RECENT_INFORMATION: &str =
    "There is insufficient recent information to answer this question.";

/// Answer when documents were found but none carried a summary.
pub const NOT_ENOUGH_DETAIL: &str =
    "Recent news coverage does not provide enough detail to assess this.";

/// Documents shown in the fusion debug trace.
const TRACE_DOCS: usize = 5;

/// A question and its retrieval parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    pub question: String,

    /// Restrict retrieval to one asset symbol.
    pub symbol: Option<String>,

    /// Only documents published within this many hours are eligible.
    pub lookback_hours: u32,

    /// Results fetched per expanded query.
    pub n_results: usize,
}

impl AnswerRequest {
    /// Request with the default window (48 hours) and 5 results per query.
    pub fn new(question: impl Into<String>) -> Self {
        Self::with_defaults(question, &RetrievalConfig::default())
    }

    /// Request with the window and result count of a retrieval configuration.
    pub fn with_defaults(question: impl Into<String>, defaults: &RetrievalConfig) -> Self {
        Self {
            question: question.into(),
            symbol: None,
            lookback_hours: defaults.lookback_hours,
            n_results: defaults.n_results,
        }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn lookback_hours(mut self, hours: u32) -> Self {
        self.lookback_hours = hours;
        self
    }

    pub fn n_results(mut self, n: usize) -> Self {
        self.n_results = n;
        self
    }
}

/// Multi-query retrieval, fusion, sentiment scoring and answer synthesis.
///
/// The engine holds no per-request state; one instance serves concurrent
/// requests.
pub struct QueryEngine {
    classifier: IntentClassifier,
    expander: QueryExpander,
    retriever: MultiQueryRetriever,
    relevance: IntentRelevance,
    scorer: SentimentScorer,
    synthesizer: AnswerSynthesizer,
    max_evidence: usize,
    max_news: usize,
}

impl QueryEngine {
    /// Create a new query engine.
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        generator: Arc<dyn TextGenerator>,
        config: &StockRagConfig,
    ) -> Self {
        let retrieval = &config.retrieval;
        Self {
            classifier: IntentClassifier::new(&config.intent),
            expander: QueryExpander::new(
                generator.clone(),
                retrieval.max_queries,
                Duration::from_millis(retrieval.expansion_timeout_ms),
            ),
            retriever: MultiQueryRetriever::new(
                search,
                Duration::from_millis(retrieval.search_timeout_ms),
            ),
            relevance: IntentRelevance::new(&config.lexicon),
            scorer: SentimentScorer::new(&config.lexicon),
            synthesizer: AnswerSynthesizer::new(
                generator,
                Duration::from_millis(retrieval.generation_timeout_ms),
            ),
            max_evidence: retrieval.max_evidence,
            max_news: retrieval.max_news,
        }
    }

    /// Answer a question against documents published in the lookback window
    /// ending now.
    pub async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResponse> {
        self.answer_at(request, Utc::now()).await
    }

    /// Answer a question with an explicit clock.
    ///
    /// Only invalid requests fail; upstream failures degrade the answer.
    pub async fn answer_at(
        &self,
        request: &AnswerRequest,
        now: DateTime<Utc>,
    ) -> Result<AnswerResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(StockRagError::invalid_argument("question must not be empty"));
        }
        if request.n_results == 0 {
            return Err(StockRagError::invalid_argument("n_results must be at least 1"));
        }

        let start = Instant::now();
        info!("Answering: {:?}", question);

        let intent = self.classifier.classify(question);
        let queries = self.expander.expand(question).await;
        debug!("Intent {} with {} queries", intent, queries.len());

        let filter = SearchFilter::lookback(request.lookback_hours, now, request.symbol.as_deref());
        let lists = self
            .retriever
            .retrieve(queries.iter(), &filter, request.n_results)
            .await;

        if lists.iter().all(|list| list.is_empty()) {
            info!("No documents in the last {}h", request.lookback_hours);
            return Ok(AnswerResponse::insufficient(NO_RECENT_INFORMATION));
        }

        let fused = fuse_with_intent(&lists, intent, &self.relevance);
        debug!("Fused {} lists into {} documents", lists.len(), fused.len());
        if tracing::enabled!(Level::DEBUG) {
            debug!("Fusion trace:\n{}", fused.trace(TRACE_DOCS));
        }

        let summaries = fused.summaries();
        if summaries.is_empty() {
            info!("Fused documents carry no summaries");
            return Ok(AnswerResponse::insufficient(NOT_ENOUGH_DETAIL));
        }

        let verdict = self.scorer.score(&summaries);
        debug!("Sentiment breakdown: {:?}", verdict.breakdown);

        let evidence = select_evidence(&fused.documents, self.max_evidence);
        let news = select_news(&fused.documents, self.max_news);
        let answer = self.synthesizer.synthesize(question, &summaries).await;

        info!(
            "Answered in {}ms: {} / {} from {} summaries",
            start.elapsed().as_millis(),
            verdict.label,
            verdict.confidence,
            summaries.len()
        );

        Ok(AnswerResponse {
            answer,
            sentiment: verdict.label,
            confidence: verdict.confidence,
            evidence,
            news,
        })
    }
}
