
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const INGESTION_COLUMNS: &str = "id, document_path, fingerprint, index_name, namespace, \
     separator, chunk_size, chunk_overlap, oversized_runs, embedding_model, page_count, \
     chunk_count, status, error_message, started_at, completed_at";

pub struct IngestionQueries;

impl IngestionQueries {
    /// Record a pending ingestion
    #[inline]
    pub async fn create(pool: &SqlitePool, new: &NewIngestion) -> Result<Ingestion> {
        let id = sqlx::query(
            "INSERT INTO ingestions (document_path, fingerprint, index_name, namespace, separator, \
             chunk_size, chunk_overlap, oversized_runs, embedding_model, status, started_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(&new.document_path)
        .bind(&new.fingerprint)
        .bind(&new.index_name)
        .bind(&new.namespace)
        .bind(&new.separator)
        .bind(new.chunk_size)
        .bind(new.chunk_overlap)
        .bind(&new.oversized_runs)
        .bind(&new.embedding_model)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to create ingestion")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created ingestion"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Ingestion>> {
        let query = format!("SELECT {} FROM ingestions WHERE id = ?", INGESTION_COLUMNS);
        sqlx::query_as::<_, Ingestion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get ingestion by id")
    }

    #[inline]
    pub async fn complete(
        pool: &SqlitePool,
        id: i64,
        page_count: i64,
        chunk_count: i64,
    ) -> Result<Option<Ingestion>> {
        sqlx::query(
            "UPDATE ingestions SET status = 'completed', page_count = ?, chunk_count = ?, \
             error_message = NULL, completed_at = ? WHERE id = ?",
        )
        .bind(page_count)
        .bind(chunk_count)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to complete ingestion")?;

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn fail(pool: &SqlitePool, id: i64, error_message: &str) -> Result<Option<Ingestion>> {
        sqlx::query(
            "UPDATE ingestions SET status = 'failed', error_message = ?, completed_at = ? WHERE id = ?",
        )
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark ingestion as failed")?;

        Self::get_by_id(pool, id).await
    }

    /// Most recent completed ingestion producing the same records as `new`
    #[inline]
    pub async fn find_completed(pool: &SqlitePool, new: &NewIngestion) -> Result<Option<Ingestion>> {
        let query = format!(
            "SELECT {} FROM ingestions \
             WHERE status = 'completed' AND fingerprint = ? AND index_name = ? AND namespace = ? \
             AND separator = ? AND chunk_size = ? AND chunk_overlap = ? AND oversized_runs = ? \
             AND embedding_model = ? \
             ORDER BY completed_at DESC, id DESC LIMIT 1",
            INGESTION_COLUMNS
        );

        let found = sqlx::query_as::<_, Ingestion>(&query)
            .bind(&new.fingerprint)
            .bind(&new.index_name)
            .bind(&new.namespace)
            .bind(&new.separator)
            .bind(new.chunk_size)
            .bind(new.chunk_overlap)
            .bind(&new.oversized_runs)
            .bind(&new.embedding_model)
            .fetch_optional(pool)
            .await
            .context("Failed to look up completed ingestion")?;

        debug!(
            "Completed ingestion for fingerprint {}: {}",
            new.fingerprint,
            found.is_some()
        );
        Ok(found)
    }

    #[inline]
    pub async fn latest_for_namespace(
        pool: &SqlitePool,
        index_name: &str,
        namespace: &str,
    ) -> Result<Option<Ingestion>> {
        let query = format!(
            "SELECT {} FROM ingestions WHERE index_name = ? AND namespace = ? \
             ORDER BY started_at DESC, id DESC LIMIT 1",
            INGESTION_COLUMNS
        );

        sqlx::query_as::<_, Ingestion>(&query)
            .bind(index_name)
            .bind(namespace)
            .fetch_optional(pool)
            .await
            .context("Failed to get latest ingestion")
    }

    #[inline]
    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Ingestion>> {
        let query = format!(
            "SELECT {} FROM ingestions ORDER BY started_at DESC, id DESC LIMIT ?",
            INGESTION_COLUMNS
        );

        sqlx::query_as::<_, Ingestion>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
            .context("Failed to list ingestions")
    }
}

pub struct SessionQueries;

impl SessionQueries {
    #[inline]
    pub async fn create(
        pool: &SqlitePool,
        id: &str,
        title: Option<&str>,
    ) -> Result<ChatSessionRecord> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO chat_sessions (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(title)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create chat session")?;

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created chat session"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<ChatSessionRecord>> {
        sqlx::query_as::<_, ChatSessionRecord>(
            "SELECT id, title, created_at, updated_at FROM chat_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get chat session")
    }

    #[inline]
    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<SessionSummary>> {
        sqlx::query_as::<_, SessionSummary>(
            "SELECT s.id, s.title, s.created_at, s.updated_at, COUNT(t.id) AS turn_count \
             FROM chat_sessions s LEFT JOIN chat_turns t ON t.session_id = s.id \
             GROUP BY s.id ORDER BY s.updated_at DESC, s.created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list chat sessions")
    }
}

pub struct TurnQueries;

impl TurnQueries {
    /// Append a turn after the session's last one
    #[inline]
    pub async fn append(pool: &SqlitePool, turn: &NewTurn) -> Result<StoredTurn> {
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM chat_turns WHERE session_id = ?",
        )
        .bind(&turn.session_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to compute turn position")?;

        let id = sqlx::query(
            "INSERT INTO chat_turns (session_id, position, question, answer, asked_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&turn.session_id)
        .bind(position)
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(turn.asked_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert chat turn")?
        .last_insert_rowid();

        sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(&turn.session_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch chat session")?;

        tx.commit().await.context("Failed to commit chat turn")?;

        Ok(StoredTurn {
            id,
            session_id: turn.session_id.clone(),
            position,
            question: turn.question.clone(),
            answer: turn.answer.clone(),
            asked_at: turn.asked_at,
        })
    }

    /// The last `limit` turns of a session, oldest first
    #[inline]
    pub async fn list_recent(
        pool: &SqlitePool,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredTurn>> {
        let mut turns = sqlx::query_as::<_, StoredTurn>(
            "SELECT id, session_id, position, question, answer, asked_at FROM chat_turns \
             WHERE session_id = ? ORDER BY position DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list chat turns")?;

        turns.reverse();
        Ok(turns)
    }
}
