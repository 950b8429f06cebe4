//! Document ingestion: load, chunk, embed and upsert, recorded in the ledger.
//!
//! Every chunk is embedded and checked before the first record is written,
//! so an embedding failure leaves the index untouched.

pub mod lock;


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::Database;
use crate::database::models::NewIngestion;
use crate::document::{self, LoadedDocument};
use crate::embeddings::{ChunkingConfig, Embedder, chunk_pages};
use crate::vector_store::{VectorStore, check_dimensions, pair_records};
use crate::{RagError, Result};

pub use lock::IngestLock;

/// Age after which an abandoned lock file is replaced
pub const STALE_LOCK_AFTER: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// An identical completed ingestion was found and the index is populated
    Skipped,
    Ingested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub outcome: IngestOutcome,
    pub ingestion_id: i64,
    pub fingerprint: String,
    pub pages: usize,
    pub chunks: usize,
    pub written: usize,
}

pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    database: Database,
    chunking: ChunkingConfig,
    embedding_model: String,
    index: String,
    namespace: String,
    upsert_batch_size: usize,
    lock_path: PathBuf,
}

impl Ingestor {
    #[inline]
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        database: Database,
    ) -> Self {
        Self {
            embedder,
            store,
            database,
            chunking: config.chunking.clone(),
            embedding_model: config.embedding.model.to_string(),
            index: config.vector_store.index_name.clone(),
            namespace: config.vector_store.namespace.clone(),
            upsert_batch_size: config.vector_store.upsert_batch_size.max(1),
            lock_path: config.ingest_lock_path(),
        }
    }

    /// Ledger key for ingesting `path` with the current settings
    pub fn ingestion_key(&self, path: &Path, fingerprint: &str) -> NewIngestion {
        NewIngestion {
            document_path: path.display().to_string(),
            fingerprint: fingerprint.to_string(),
            index_name: self.index.clone(),
            namespace: self.namespace.clone(),
            separator: self.chunking.separator.clone(),
            chunk_size: self.chunking.chunk_size as i64,
            chunk_overlap: self.chunking.chunk_overlap as i64,
            oversized_runs: self.chunking.oversized_runs.to_string(),
            embedding_model: self.embedding_model.clone(),
        }
    }

    /// Ingest a document unless an identical ingestion already populated the index
    ///
    /// Any ingestion that is not skipped replaces the whole namespace, once every
    /// chunk has been embedded. With `force` the ledger is not consulted.
    pub async fn ingest(&self, path: &Path, force: bool) -> Result<IngestReport> {
        let fingerprint = document::fingerprint(path)?;
        let key = self.ingestion_key(path, &fingerprint);

        if !force {
            if let Some(report) = self.reusable(&key).await? {
                return Ok(report);
            }
        }

        let _lock = IngestLock::acquire(&self.lock_path, STALE_LOCK_AFTER)?;
        let ingestion = self.database.record_ingestion(&key).await?;
        info!(
            "Ingesting {} into {}/{} (ingestion {})",
            path.display(),
            self.index,
            self.namespace,
            ingestion.id
        );

        match self.load_and_write(path).await {
            Ok((loaded, chunks, written)) => {
                self.database
                    .complete_ingestion(ingestion.id, loaded.pages.len(), chunks)
                    .await?;
                if loaded.fingerprint != fingerprint {
                    warn!("{} changed while it was being ingested", path.display());
                }
                info!(
                    "Ingested {} pages as {} chunks ({} records written)",
                    loaded.pages.len(),
                    chunks,
                    written
                );
                Ok(IngestReport {
                    outcome: IngestOutcome::Ingested,
                    ingestion_id: ingestion.id,
                    fingerprint: loaded.fingerprint,
                    pages: loaded.pages.len(),
                    chunks,
                    written,
                })
            }
            Err(e) => {
                warn!("Ingestion {} failed: {}", ingestion.id, e);
                if let Err(ledger_error) = self
                    .database
                    .fail_ingestion(ingestion.id, &e.to_string())
                    .await
                {
                    warn!("Could not record failed ingestion: {}", ledger_error);
                }
                Err(e)
            }
        }
    }

    async fn reusable(&self, key: &NewIngestion) -> Result<Option<IngestReport>> {
        let Some(previous) = self.database.find_completed_ingestion(key).await? else {
            return Ok(None);
        };

        // Another document may have been ingested into the namespace since
        let latest = self
            .database
            .latest_ingestion(&self.index, &self.namespace)
            .await?;
        if latest.as_ref().map(|latest| latest.id) != Some(previous.id) {
            debug!(
                "{}/{} was written after ingestion {}, re-ingesting",
                self.index, self.namespace, previous.id
            );
            return Ok(None);
        }

        let stored = self.store.count(&self.index, &self.namespace).await?;
        if stored != previous.chunk_count as usize {
            debug!(
                "Ingestion {} wrote {} records but {}/{} holds {}, re-ingesting",
                previous.id, previous.chunk_count, self.index, self.namespace, stored
            );
            return Ok(None);
        }

        info!(
            "Document unchanged since ingestion {} ({} records stored), skipping",
            previous.id, stored
        );
        Ok(Some(IngestReport {
            outcome: IngestOutcome::Skipped,
            ingestion_id: previous.id,
            fingerprint: previous.fingerprint,
            pages: previous.page_count as usize,
            chunks: previous.chunk_count as usize,
            written: 0,
        }))
    }

    async fn load_and_write(&self, path: &Path) -> Result<(LoadedDocument, usize, usize)> {
        let loaded = document::load_document(path)?;
        let source = path.display().to_string();
        let chunks = chunk_pages(&source, &loaded.pages, &self.chunking)?;

        if chunks.is_empty() {
            return Err(RagError::Parse(format!(
                "{}: no text could be extracted",
                path.display()
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts)?;
        let records = pair_records(&chunks, &loaded.fingerprint, vectors)?;
        check_dimensions(&records, self.embedder.dimension())?;

        // Records of an earlier document or chunking have different ids
        self.store
            .delete_namespace(&self.index, &self.namespace)
            .await?;

        let mut written = 0;
        for batch in records.chunks(self.upsert_batch_size) {
            written += self
                .store
                .upsert(&self.index, &self.namespace, batch)
                .await?;
            debug!("Wrote {}/{} records", written, records.len());
        }

        Ok((loaded, chunks.len(), written))
    }
}
