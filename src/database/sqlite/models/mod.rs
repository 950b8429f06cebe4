
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Ingestion {
    pub id: i64,
    pub document_path: String,
    pub fingerprint: String,
    pub index_name: String,
    pub namespace: String,
    pub separator: String,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub oversized_runs: String,
    pub embedding_model: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub status: IngestionStatus,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum IngestionStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for IngestionStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            IngestionStatus::Pending => write!(f, "Pending"),
            IngestionStatus::Completed => write!(f, "Completed"),
            IngestionStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Everything that decides whether an earlier ingestion can be reused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngestion {
    pub document_path: String,
    pub fingerprint: String,
    pub index_name: String,
    pub namespace: String,
    pub separator: String,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub oversized_runs: String,
    pub embedding_model: String,
}

impl NewIngestion {
    /// Whether `ingestion` produced the records this one would
    #[inline]
    pub fn is_satisfied_by(&self, ingestion: &Ingestion) -> bool {
        ingestion.status == IngestionStatus::Completed
            && ingestion.fingerprint == self.fingerprint
            && ingestion.index_name == self.index_name
            && ingestion.namespace == self.namespace
            && ingestion.separator == self.separator
            && ingestion.chunk_size == self.chunk_size
            && ingestion.chunk_overlap == self.chunk_overlap
            && ingestion.oversized_runs == self.oversized_runs
            && ingestion.embedding_model == self.embedding_model
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatSessionRecord {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SessionSummary {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turn_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StoredTurn {
    pub id: i64,
    pub session_id: String,
    pub position: i64,
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTurn {
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}
