//! stockrag-query - question answering over recent news
//!
//! This crate turns a question into a grounded answer with a sentiment label
//! and a confidence tier.
//!
//! # Pipeline
//!
//! 1. Classify the question's intent and expand it into paraphrased queries
//! 2. Run one time-windowed similarity search per query, concurrently
//! 3. Fuse the per-query rankings and an intent-relevance ranking with
//!    Reciprocal Rank Fusion
//! 4. Score the fused summaries with weighted lexicons and a hedging penalty
//! 5. Pick evidence and news, and synthesize the answer from summaries only
//!
//! # Example
//!
//! ```rust,ignore
//! use stockrag_query::{AnswerRequest, QueryEngine};
//!
//! let engine = QueryEngine::new(index, generator, &config);
//! let response = engine.answer(&AnswerRequest::new("How is ACME performing today?")).await?;
//! ```

mod engine;
mod evidence;
mod expansion;
mod fusion;
mod intent;
mod prompts;
mod retriever;
mod sentiment;
mod synth;

pub use engine::{AnswerRequest, QueryEngine, NOT_ENOUGH_DETAIL, NO_RECENT_INFORMATION};
pub use evidence::{select_evidence, select_news};
pub use expansion::{parse_expansion, ExpandedQuerySet, QueryExpander};
pub use fusion::{
    fuse_with_intent, reciprocal_rank_fusion, rrf_contribution, score_summary_for_intent,
    FusedDocument, FusedResults, FusionTrace, IntentRelevance, SignalContribution, TraceEntry,
    RRF_K,
};
pub use intent::{Intent, IntentClassifier};
pub use prompts::{answer_context, answer_prompt, expansion_prompt, headline_summary_prompt};
pub use retriever::{MultiQueryRetriever, RankedList};
pub use sentiment::{SentimentBreakdown, SentimentScorer, SentimentVerdict};
pub use synth::{extractive_answer, AnswerSynthesizer};

// Re-export for convenience
pub use stockrag_core::{AnswerResponse, Confidence, Evidence, NewsItem, Sentiment};
