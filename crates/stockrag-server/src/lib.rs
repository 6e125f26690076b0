//! stockrag-server - Application facade
//!
//! This crate ties the document index, the embedder, the text generator and
//! the query engine together behind [`StockRagServer`].
//!
//! # Operations
//!
//! - `ask` / `ask_json` - Answer a question about recent news
//! - `ingest` - Ingest a JSON news file
//! - `backfill_summaries` - Generate headline summaries for weak feed entries
//! - `remove_symbol` - Delete every document of a symbol
//! - `stats` - Get statistics about the index

pub mod ingest;
mod server;

pub use ingest::{
    parse_published, parse_records, IngestReport, NewsRecord, ParsedRecords, SummaryCheck,
};
pub use server::{render_answer, AskParams, BackfillReport, StockRagServer, ToolResult};
