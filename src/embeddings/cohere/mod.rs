
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::{Config, ConfigError};
use crate::embeddings::{Embedder, EmbeddingModel};
use crate::http::{ApiClient, ServiceError, endpoint};
use crate::{RagError, Result};

/// Largest number of texts the embed endpoint accepts per call
pub const MAX_BATCH_SIZE: usize = 96;

/// How the service should treat the embedded text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    SearchDocument,
    SearchQuery,
}

#[derive(Debug, Clone)]
pub struct CohereClient {
    api: ApiClient,
    base_url: Url,
    model: EmbeddingModel,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: InputType,
    embedding_types: [&'static str; 1],
    truncate: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: EmbeddingsByType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsByType {
    float: Vec<Vec<f32>>,
}

impl CohereClient {
    #[inline]
    pub fn new(config: &Config, api_key: &str) -> Result<Self> {
        let base_url = config
            .embedding
            .base_url()
            .map_err(|e: ConfigError| RagError::Config(e.to_string()))?;

        let api = ApiClient::new(&config.http)
            .with_bearer_token(api_key)
            .with_header("Accept", "application/json");

        Ok(Self {
            api,
            base_url,
            model: config.embedding.model,
            batch_size: (config.embedding.batch_size as usize).clamp(1, MAX_BATCH_SIZE),
        })
    }

    /// Replace the HTTP client, e.g. to shorten retry delays
    #[inline]
    pub fn with_api_client(mut self, api: ApiClient) -> Self {
        self.api = api;
        self
    }

    /// Embed texts in batches, returning one vector per text in input order
    #[inline]
    pub fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating {:?} embeddings for {} texts with {}",
            input_type,
            texts.len(),
            self.model
        );

        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self.embed_batch(batch, input_type)?;
            vectors.extend(batch_vectors);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let url = endpoint(&self.base_url, "v2/embed").map_err(RagError::Embedding)?;

        let request = EmbedRequest {
            model: self.model.as_str(),
            texts,
            input_type,
            embedding_types: ["float"],
            truncate: "END",
        };

        let response: EmbedResponse = self
            .api
            .post_json(&url, &request)
            .map_err(RagError::Embedding)?;

        let vectors = response.embeddings.float;

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(ServiceError::InvalidResponse(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                vectors.len()
            ))));
        }

        let expected = self.model.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        Ok(vectors)
    }
}

impl Embedder for CohereClient {
    #[inline]
    fn dimension(&self) -> usize {
        self.model.dimension()
    }

    #[inline]
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts, InputType::SearchDocument)
    }

    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()], InputType::SearchQuery)?;
        vectors.pop().ok_or_else(|| {
            RagError::Embedding(ServiceError::InvalidResponse(
                "No embedding returned for query".to_string(),
            ))
        })
    }
}
