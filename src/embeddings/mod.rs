// Embeddings module
// Document chunking and the hosted embedding service client

pub mod chunking;
pub mod cohere;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Result;

pub use chunking::{ChunkingConfig, DocumentChunk, OversizedRunPolicy, TextSpan, chunk_pages, split_text};
pub use cohere::{CohereClient, InputType};

/// Maps text to fixed-dimension vectors, preserving input order
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding models recognized by the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmbeddingModel {
    #[default]
    #[serde(rename = "embed-english-v3.0")]
    EmbedEnglishV3,
    #[serde(rename = "embed-multilingual-v3.0")]
    EmbedMultilingualV3,
    #[serde(rename = "embed-english-light-v3.0")]
    EmbedEnglishLightV3,
    #[serde(rename = "embed-multilingual-light-v3.0")]
    EmbedMultilingualLightV3,
}

impl EmbeddingModel {
    pub const ALL: [EmbeddingModel; 4] = [
        Self::EmbedEnglishV3,
        Self::EmbedMultilingualV3,
        Self::EmbedEnglishLightV3,
        Self::EmbedMultilingualLightV3,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::EmbedEnglishV3 => "embed-english-v3.0",
            Self::EmbedMultilingualV3 => "embed-multilingual-v3.0",
            Self::EmbedEnglishLightV3 => "embed-english-light-v3.0",
            Self::EmbedMultilingualLightV3 => "embed-multilingual-light-v3.0",
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        match *self {
            Self::EmbedEnglishV3 | Self::EmbedMultilingualV3 => 1024,
            Self::EmbedEnglishLightV3 | Self::EmbedMultilingualLightV3 => 384,
        }
    }
}

impl fmt::Display for EmbeddingModel {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| format!("Unknown embedding model: {}", s))
    }
}
