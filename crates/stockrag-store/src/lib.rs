//! stockrag-store - SQLite document index
//!
//! This crate provides persistent storage for news and price documents with
//! their embeddings, and the time-windowed similarity search the query
//! pipeline retrieves from.

mod index;
mod schema;
mod sqlite;

pub use index::DocumentIndex;
pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
