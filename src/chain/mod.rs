//! Retrieval chain: embed the question, fetch the closest chunks, then ask
//! the model to answer from them.


use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::embeddings::Embedder;
use crate::llm::AnswerGenerator;
use crate::session::ChatTurn;
use crate::vector_store::{SearchResult, VectorStore};

/// Fetches the documents a question should be answered from
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// Retrieves by embedding the query and searching one namespace
pub struct VectorStoreRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    index: String,
    namespace: String,
    top_k: usize,
}

impl VectorStoreRetriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        index: impl Into<String>,
        namespace: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            index: index.into(),
            namespace: namespace.into(),
            top_k: top_k.max(1),
        }
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Search with an explicit result count
    pub async fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.embed_query(query)?;
        self.store
            .search(&self.index, &self.namespace, &vector, k)
            .await
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve_k(query, self.top_k).await
    }
}

/// Where the last invocation got to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainState {
    Idle,
    Retrieving,
    Generating,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainResponse {
    pub input: String,
    pub answer: String,
    pub context: Vec<SearchResult>,
}

pub struct RetrievalChain {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn AnswerGenerator>,
    state: ChainState,
}

impl RetrievalChain {
    #[inline]
    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            retriever,
            generator,
            state: ChainState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> ChainState {
        self.state
    }

    #[inline]
    pub async fn invoke(&mut self, input: &str) -> Result<ChainResponse> {
        self.invoke_with_history(input, &[]).await
    }

    /// Answer `input`, giving the generator earlier turns of the conversation
    ///
    /// A failed generation discards the retrieved context.
    pub async fn invoke_with_history(
        &mut self,
        input: &str,
        history: &[ChatTurn],
    ) -> Result<ChainResponse> {
        self.state = ChainState::Retrieving;
        let context = match self.retriever.retrieve(input).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                self.state = ChainState::Failed;
                return Err(e);
            }
        };
        debug!("Retrieved {} documents", context.len());

        self.state = ChainState::Generating;
        let documents: Vec<String> = context.iter().map(|r| r.metadata.text.clone()).collect();
        let answer = match self.generator.generate(input, &documents, history) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Generation failed: {}", e);
                self.state = ChainState::Failed;
                return Err(e);
            }
        };

        self.state = ChainState::Done;
        info!(
            "Answered question using {} context documents",
            context.len()
        );

        Ok(ChainResponse {
            input: input.to_string(),
            answer,
            context,
        })
    }
}
