//! SQLite-based storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use stockrag_core::{
    ContentType, DatabaseConfig, Document, DocumentId, DocumentMetadata, DocumentStore,
    RetrievedDocument, Result, SearchFilter, Stats, StockRagError, SummarySource,
};

use crate::schema::{SCHEMA, SCHEMA_VERSION};

const DOCUMENT_COLUMNS: &str = "id, symbol, title, source, source_url, content_type, \
     summary_source, published_at, text, content_hash, ingested_at, updated_at";

/// SQLite-based store implementation.
///
/// Embeddings are stored as little-endian f32 BLOBs next to the document and
/// searched by brute-force cosine similarity inside the time window.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StockRagError::database(format!("Failed to open database: {}", e)))?;

        Self::init(conn, path)
    }

    /// Open the database described by the `[database]` configuration section.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let store = Self::open(&config.path)?;
        store.with_conn(|conn| {
            conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms)))
                .map_err(|e| StockRagError::database(e.to_string()))
        })?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StockRagError::database(format!("Failed to open in-memory database: {}", e))
        })?;

        Self::init(conn, Path::new(":memory:"))
    }

    fn init(conn: Connection, path: &Path) -> Result<Self> {
        Self::configure_connection(&conn)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| StockRagError::database(format!("Failed to initialize schema: {}", e)))?;
        conn.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .map_err(|e| StockRagError::database(e.to_string()))?;

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Configure SQLite connection for optimal performance.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA busy_timeout = 30000;
            PRAGMA temp_store = MEMORY;
            "#,
        )
        .map_err(|e| StockRagError::database(format!("Failed to configure connection: {}", e)))?;

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StockRagError::database(e.to_string()))?;
        f(&conn)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_document(&self, doc: &Document, embedding: &[f32]) -> Result<bool> {
        let embedding_bytes = vec_to_bytes(embedding);

        self.with_conn(|conn| {
            let inserted = conn
                .execute(
                    r#"
                    INSERT OR IGNORE INTO documents
                    (id, symbol, title, source, source_url, content_type, summary_source,
                     published_at, text, content_hash, embedding, ingested_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    params![
                        doc.id.as_str(),
                        doc.metadata.symbol,
                        doc.metadata.title,
                        doc.metadata.source,
                        doc.metadata.source_url,
                        doc.metadata.content_type.as_str(),
                        doc.metadata.summary_source.as_str(),
                        doc.metadata.timestamp(),
                        doc.text,
                        doc.content_hash.as_ref().map(|h| h.as_slice()),
                        embedding_bytes,
                        doc.ingested_at.timestamp(),
                        doc.updated_at.timestamp(),
                    ],
                )
                .map_err(|e| StockRagError::database(e.to_string()))?;

            if inserted == 0 {
                debug!("Document {} already stored", doc.id);
            }
            Ok(inserted > 0)
        })
    }

    async fn contains(&self, id: &DocumentId) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM documents WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StockRagError::database(e.to_string()))?;
            Ok(found.is_some())
        })
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id.as_str()],
                row_to_document,
            )
            .optional()
            .map_err(|e| StockRagError::database(e.to_string()))
        })
    }

    async fn update_document(&self, doc: &Document, embedding: &[f32]) -> Result<()> {
        let embedding_bytes = vec_to_bytes(embedding);

        self.with_conn(|conn| {
            let updated = conn
                .execute(
                    r#"
                    UPDATE documents
                    SET title = ?2, source = ?3, summary_source = ?4, text = ?5,
                        content_hash = ?6, embedding = ?7, updated_at = ?8
                    WHERE id = ?1
                    "#,
                    params![
                        doc.id.as_str(),
                        doc.metadata.title,
                        doc.metadata.source,
                        doc.metadata.summary_source.as_str(),
                        doc.text,
                        doc.content_hash.as_ref().map(|h| h.as_slice()),
                        embedding_bytes,
                        doc.updated_at.timestamp(),
                    ],
                )
                .map_err(|e| StockRagError::database(e.to_string()))?;

            if updated == 0 {
                return Err(StockRagError::DocumentNotFound {
                    id: doc.id.to_string(),
                });
            }
            Ok(())
        })
    }

    async fn documents_needing_summary(&self, limit: u32) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM documents WHERE summary_source = ?1 \
                     ORDER BY published_at ASC, id ASC LIMIT ?2",
                    DOCUMENT_COLUMNS
                ))
                .map_err(|e| StockRagError::database(e.to_string()))?;

            let rows = stmt
                .query_map(
                    params![SummarySource::NeedsLlm.as_str(), limit],
                    row_to_document,
                )
                .map_err(|e| StockRagError::database(e.to_string()))?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| StockRagError::database(e.to_string()))
        })
    }

    async fn delete_symbol(&self, symbol: &str) -> Result<u64> {
        let symbol = symbol.trim().to_uppercase();

        self.with_conn(|conn| {
            let removed = conn
                .execute("DELETE FROM documents WHERE symbol = ?1", params![symbol])
                .map_err(|e| StockRagError::database(e.to_string()))?;
            info!("Removed {} documents for {}", removed, symbol);
            Ok(removed as u64)
        })
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let cutoff = filter.cutoff_timestamp();
        let symbol = filter.symbol.clone();

        let mut scored = self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    r#"
                    SELECT {}, embedding FROM documents
                    WHERE published_at >= ?1
                    AND (?2 IS NULL OR symbol = ?2)
                    AND embedding IS NOT NULL
                    ORDER BY published_at DESC, id ASC
                    "#,
                    DOCUMENT_COLUMNS
                ))
                .map_err(|e| StockRagError::database(e.to_string()))?;

            let rows = stmt
                .query_map(params![cutoff, symbol], |row| {
                    let doc = row_to_document(row)?;
                    let blob: Vec<u8> = row.get(12)?;
                    Ok((doc, blob))
                })
                .map_err(|e| StockRagError::database(e.to_string()))?;

            let mut scored = Vec::new();
            for row in rows {
                let (doc, blob) = row.map_err(|e| StockRagError::database(e.to_string()))?;
                let stored = bytes_to_vec(&blob);
                if stored.len() != embedding.len() {
                    debug!(
                        "Skipping {}: embedding dimension {} != {}",
                        doc.id,
                        stored.len(),
                        embedding.len()
                    );
                    continue;
                }
                scored.push(RetrievedDocument {
                    similarity: cosine_similarity(embedding, &stored),
                    id: doc.id,
                    text: doc.text,
                    metadata: doc.metadata,
                });
            }
            Ok(scored)
        })?;

        // Stable sort keeps the newest-first order among equal similarities
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        debug!("Vector search returned {} documents", scored.len());
        Ok(scored)
    }

    async fn get_stats(&self, symbol: Option<&str>) -> Result<Stats> {
        let symbol = symbol.map(|s| s.trim().to_uppercase());

        self.with_conn(move |conn| {
            let (documents, embedded, symbols, needs_summary): (u64, u64, u64, u64) = conn
                .query_row(
                    r#"
                    SELECT COUNT(*),
                           COUNT(embedding),
                           COUNT(DISTINCT symbol),
                           COALESCE(SUM(summary_source = ?2), 0)
                    FROM documents
                    WHERE (?1 IS NULL OR symbol = ?1)
                    "#,
                    params![symbol, SummarySource::NeedsLlm.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .map_err(|e| StockRagError::database(e.to_string()))?;

            // Get page count and page size to estimate storage
            let page_count: u64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: u64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            Ok(Stats {
                documents,
                embedded,
                symbols,
                needs_summary,
                storage_bytes: page_count * page_size,
                filter: symbol,
            })
        })
    }
}

/// Convert a row to a Document.
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let content_type: String = row.get(5)?;
    let summary_source: String = row.get(6)?;
    let content_hash: Option<Vec<u8>> = row.get(9)?;

    Ok(Document {
        id: DocumentId::from_raw(id),
        text: row.get(8)?,
        metadata: DocumentMetadata {
            symbol: row.get(1)?,
            title: row.get(2)?,
            source: row.get(3)?,
            source_url: row.get(4)?,
            content_type: ContentType::from_label(&content_type),
            summary_source: SummarySource::from_label(&summary_source),
            published_at: from_timestamp(row.get(7)?),
        },
        content_hash: content_hash.and_then(|v| v.try_into().ok()),
        ingested_at: from_timestamp(row.get(10)?),
        updated_at: from_timestamp(row.get(11)?),
    })
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Convert f32 vector to bytes (little-endian).
fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
