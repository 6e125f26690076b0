//! Error types for the stockrag system.

use thiserror::Error;

/// Result type alias using StockRagError.
pub type Result<T> = std::result::Result<T, StockRagError>;

/// Errors that can occur in the stockrag system.
#[derive(Error, Debug)]
pub enum StockRagError {
    /// Document not found.
    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A record could not be turned into a document.
    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Text generation service error.
    #[error("Generation error: {message}")]
    Generation { message: String },

    /// Similarity search error.
    #[error("Retrieval error: {message}")]
    Retrieval { message: String },

    /// An external call exceeded its time budget.
    #[error("Timed out after {millis}ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StockRagError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a retrieval error.
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the failure came from an upstream service and can be degraded
    /// around instead of surfaced.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Generation { .. } | Self::Retrieval { .. } | Self::Timeout { .. } | Self::Embedding { .. }
        )
    }

    /// Get the error code for tool and CLI responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::InvalidDocument { .. } => "INVALID_DOCUMENT",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Generation { .. } => "GENERATION_ERROR",
            Self::Retrieval { .. } => "RETRIEVAL_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockRagError::DocumentNotFound {
            id: "abc123".to_string(),
        };
        assert!(err.to_string().contains("abc123"));

        let err = StockRagError::timeout("query expansion", 250);
        assert_eq!(err.to_string(), "Timed out after 250ms: query expansion");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StockRagError::DocumentNotFound {
                id: "x".to_string()
            }
            .error_code(),
            "DOCUMENT_NOT_FOUND"
        );
        assert_eq!(StockRagError::database("test").error_code(), "DATABASE_ERROR");
        assert_eq!(StockRagError::generation("down").error_code(), "GENERATION_ERROR");
    }

    #[test]
    fn test_upstream_classification() {
        assert!(StockRagError::generation("503").is_upstream());
        assert!(StockRagError::timeout("search", 10).is_upstream());
        assert!(!StockRagError::invalid_argument("empty").is_upstream());
        assert!(!StockRagError::database("locked").is_upstream());
    }
}
