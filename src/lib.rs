use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("Embedding service error: {0}")]
    Embedding(#[source] http::ServiceError),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Vector service error: {0}")]
    VectorService(#[source] http::ServiceError),

    #[error("Generation error: {0}")]
    Generation(#[source] http::ServiceError),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Another ingestion holds the lock file {}", .0.display())]
    IngestionLocked(PathBuf),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl RagError {
    /// Whether reissuing the same request may succeed
    #[inline]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Embedding(e) | Self::VectorService(e) | Self::Generation(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub mod chain;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod vector_store;
