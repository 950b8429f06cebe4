//! Wires configuration and secrets into a ready-to-use RAG pipeline.


use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::chain::{RetrievalChain, VectorStoreRetriever};
use crate::config::{Config, Secrets};
use crate::database::Database;
use crate::database::models::Ingestion;
use crate::embeddings::{CohereClient, Embedder};
use crate::ingest::{IngestReport, Ingestor};
use crate::llm::{AnswerGenerator, GroqClient, PromptTemplate, PromptedGenerator};
use crate::vector_store::{
    IndexSpec, IndexStatus, LanceStore, MemoryStore, PineconeStore, VectorBackend, VectorStore,
};
use crate::Result;

pub struct Pipeline {
    config: Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn AnswerGenerator>,
    database: Database,
    retriever: Arc<VectorStoreRetriever>,
    index: OnceCell<IndexStatus>,
}

/// Snapshot reported by the `status` command
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub document: PathBuf,
    pub backend: VectorBackend,
    pub index: String,
    pub namespace: String,
    pub dimension: usize,
    pub records: usize,
    pub last_ingestion: Option<Ingestion>,
}

impl Pipeline {
    /// Build the hosted clients named by the configuration
    pub async fn from_config(config: Config, secrets: &Secrets) -> Result<Self> {
        config.validate()?;

        let embedder: Arc<dyn Embedder> = Arc::new(CohereClient::new(&config, secrets.cohere()?)?);
        let store = build_store(&config, secrets).await?;

        let template = PromptTemplate::resolve(&config.prompt, config.get_base_dir())?;
        let generator: Arc<dyn AnswerGenerator> = Arc::new(
            PromptedGenerator::new(GroqClient::new(&config, secrets.groq()?)?, template)
                .with_history_turns(config.session.history_in_prompt),
        );

        let database = Database::initialize_from_config_dir(config.get_base_dir()).await?;

        info!(
            "Pipeline ready: {} embeddings, {} store, {} chat model",
            config.embedding.model, config.vector_store.backend, config.llm.model
        );
        Ok(Self::from_parts(config, embedder, store, generator, database))
    }

    /// Assemble a pipeline from already-built components
    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn AnswerGenerator>,
        database: Database,
    ) -> Self {
        let retriever = Arc::new(VectorStoreRetriever::new(
            embedder.clone(),
            store.clone(),
            config.vector_store.index_name.clone(),
            config.vector_store.namespace.clone(),
            config.vector_store.top_k,
        ));

        Self {
            config,
            embedder,
            store,
            generator,
            database,
            retriever,
            index: OnceCell::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn retriever(&self) -> &VectorStoreRetriever {
        &self.retriever
    }

    #[inline]
    pub fn document_path(&self) -> &Path {
        &self.config.document.path
    }

    /// Create the index if needed, at most once per pipeline
    pub async fn ensure_index(&self) -> Result<IndexStatus> {
        let status = self
            .index
            .get_or_try_init(|| async {
                let spec =
                    IndexSpec::from_config(&self.config.vector_store, self.embedder.dimension());
                self.store.ensure_index(&spec).await
            })
            .await?;
        Ok(*status)
    }

    /// Make sure the index exists and holds the configured document
    pub async fn provision(&self, force: bool) -> Result<IngestReport> {
        let status = self.ensure_index().await?;
        debug!("Index status: {:?}", status);

        let ingestor = Ingestor::new(
            &self.config,
            self.embedder.clone(),
            self.store.clone(),
            self.database.clone(),
        );
        ingestor.ingest(self.document_path(), force).await
    }

    /// A fresh chain over this pipeline's retriever and generator
    #[inline]
    pub fn chain(&self) -> RetrievalChain {
        RetrievalChain::new(self.retriever.clone(), self.generator.clone())
    }

    pub async fn status(&self) -> Result<PipelineStatus> {
        self.ensure_index().await?;

        let vector_store = &self.config.vector_store;
        let records = self
            .store
            .count(&vector_store.index_name, &vector_store.namespace)
            .await?;
        let last_ingestion = self
            .database
            .latest_ingestion(&vector_store.index_name, &vector_store.namespace)
            .await?;

        Ok(PipelineStatus {
            document: self.config.document.path.clone(),
            backend: self.store.backend(),
            index: vector_store.index_name.clone(),
            namespace: vector_store.namespace.clone(),
            dimension: self.embedder.dimension(),
            records,
            last_ingestion,
        })
    }
}

async fn build_store(config: &Config, secrets: &Secrets) -> Result<Arc<dyn VectorStore>> {
    Ok(match config.vector_store.backend {
        VectorBackend::Pinecone => Arc::new(PineconeStore::new(config, secrets.pinecone()?)?),
        VectorBackend::Lancedb => Arc::new(
            LanceStore::open(config.vector_database_path(), config.vector_store.metric).await?,
        ),
        VectorBackend::Memory => Arc::new(MemoryStore::new()),
    })
}
