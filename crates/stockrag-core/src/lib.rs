//! stockrag-core - Core types and traits for the stock news RAG system
//!
//! This crate provides the document model, the collaborator traits
//! (similarity search, text generation, embedding, storage), error handling
//! and configuration shared by every other stockrag crate.

pub mod config;
pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, StockRagError};
pub use text::{extract_summary, extract_title, render_news_text};
pub use traits::*;
pub use types::*;
