//! Error types for the corpus index
//!
//! Each subsystem has its own `thiserror` enum with actionable messages.
//! [`CorpusError`] composes them for callers that drive the whole pipeline.

use crate::types::KeyError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, persisting, loading or searching the index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid index configuration: {reason}")]
    Configuration { reason: String },

    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Batch length mismatch: {keys} keys but {vectors} vectors\nSuggestion: Every entity key needs exactly one embedding"
    )]
    BatchLengthMismatch { keys: usize, vectors: usize },

    #[error("Malformed entity key at batch position {position}: {source}")]
    MalformedKey {
        position: usize,
        #[source]
        source: KeyError,
    },

    #[error("Invalid result count {k}\nSuggestion: Request at least one result")]
    InvalidTopK { k: usize },

    #[error("No index loaded\nSuggestion: Load an index artifact before searching")]
    NotLoaded,

    #[error(
        "Failed to load index from '{path}': {reason}\nSuggestion: Rebuild the index with `corpus-index build`"
    )]
    Load { path: PathBuf, reason: String },

    #[error("Failed to persist index to '{path}': {source}\nSuggestion: Check disk space and file permissions")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    /// True for both per-vector dimension errors and key/vector count errors.
    #[must_use]
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::BatchLengthMismatch { .. }
        )
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the relational store collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to connect to database '{url}': {source}\nSuggestion: Check `database.url` in settings.toml")]
    Connection {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database {operation} failed: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to read column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

impl StoreError {
    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Query { operation, source }
    }
}

/// Errors raised by the embedding collaborator.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error(
        "Failed to initialize embedding model: {0}\nSuggestion: Ensure you have internet connection for first-time model download"
    )]
    ModelInit(String),

    #[error("Embedding generation failed: {0}")]
    Generation(String),

    #[error("Embedding model returned {embeddings} vectors for {texts} texts")]
    CountMismatch { texts: usize, embeddings: usize },

    #[error(
        "Embedding dimension mismatch: expected {expected}, got {actual}\nSuggestion: Set `embedding.dimension` to the model's output size"
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Top-level error for operations spanning several subsystems.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl CorpusError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIG_ERROR",
            Self::Key(KeyError::InvalidThreshold { .. }) => "CONFIG_ERROR",
            Self::Key(_) => "MALFORMED_KEY",
            Self::Index(e) => match e {
                IndexError::Configuration { .. } => "CONFIG_ERROR",
                IndexError::DimensionMismatch { .. } | IndexError::BatchLengthMismatch { .. } => {
                    "DIMENSION_MISMATCH"
                }
                IndexError::MalformedKey { .. } => "MALFORMED_KEY",
                IndexError::InvalidTopK { .. } => "INVALID_TOP_K",
                IndexError::NotLoaded => "INDEX_NOT_LOADED",
                IndexError::Load { .. } => "INDEX_LOAD_ERROR",
                IndexError::Persist { .. } => "INDEX_PERSIST_ERROR",
            },
            Self::Store(_) => "STORE_ERROR",
            Self::Embedding(_) => "EMBEDDING_ERROR",
        }
    }

    /// Get recovery suggestions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Configuration { .. } | Self::Key(KeyError::InvalidThreshold { .. }) => vec![
                "Check .corpus-index/settings.toml",
                "Run 'corpus-index config' to see the effective settings",
            ],
            Self::Key(_) | Self::Index(IndexError::MalformedKey { .. }) => vec![
                "Check the primary keys in customer_reviews and medical_records",
                "Review ids must be >= keys.review_threshold, patient ids below it",
            ],
            Self::Index(IndexError::Load { .. } | IndexError::NotLoaded) => vec![
                "Run 'corpus-index build' to create a fresh index",
                "Check that index_path points at the artifact written by the build",
            ],
            Self::Index(_) => vec!["Ensure the index and queries use the same embedding model"],
            Self::Store(_) => vec![
                "Check database.url in settings.toml",
                "Run 'corpus-index schema' to create missing tables",
            ],
            Self::Embedding(_) => vec!["Check embedding.model and embedding.dimension"],
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
pub type CorpusResult<T> = Result<T, CorpusError>;
