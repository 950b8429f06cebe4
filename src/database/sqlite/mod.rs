use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{
    ChatSessionRecord, Ingestion, NewIngestion, NewTurn, SessionSummary, StoredTurn,
};
use crate::database::sqlite::queries::{IngestionQueries, SessionQueries, TurnQueries};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("metadata.db")).await
    }

    // Ingestion ledger
    pub async fn record_ingestion(&self, new: &NewIngestion) -> Result<Ingestion> {
        IngestionQueries::create(&self.pool, new).await
    }

    pub async fn complete_ingestion(
        &self,
        id: i64,
        page_count: usize,
        chunk_count: usize,
    ) -> Result<Option<Ingestion>> {
        IngestionQueries::complete(&self.pool, id, page_count as i64, chunk_count as i64).await
    }

    pub async fn fail_ingestion(&self, id: i64, error_message: &str) -> Result<Option<Ingestion>> {
        IngestionQueries::fail(&self.pool, id, error_message).await
    }

    pub async fn find_completed_ingestion(&self, new: &NewIngestion) -> Result<Option<Ingestion>> {
        IngestionQueries::find_completed(&self.pool, new).await
    }

    pub async fn latest_ingestion(
        &self,
        index_name: &str,
        namespace: &str,
    ) -> Result<Option<Ingestion>> {
        IngestionQueries::latest_for_namespace(&self.pool, index_name, namespace).await
    }

    pub async fn list_ingestions(&self, limit: usize) -> Result<Vec<Ingestion>> {
        IngestionQueries::list_recent(&self.pool, limit as i64).await
    }

    // Chat sessions
    pub async fn create_session(&self, id: &str, title: Option<&str>) -> Result<ChatSessionRecord> {
        SessionQueries::create(&self.pool, id, title).await
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<ChatSessionRecord>> {
        SessionQueries::get_by_id(&self.pool, id).await
    }

    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        SessionQueries::list_recent(&self.pool, limit as i64).await
    }

    pub async fn append_turn(&self, turn: &NewTurn) -> Result<StoredTurn> {
        TurnQueries::append(&self.pool, turn).await
    }

    pub async fn list_turns(&self, session_id: &str, limit: usize) -> Result<Vec<StoredTurn>> {
        TurnQueries::list_recent(&self.pool, session_id, limit as i64).await
    }
}
