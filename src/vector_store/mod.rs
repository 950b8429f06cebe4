// Vector store module
// Index provisioning, record upsert and similarity search behind one trait

pub mod lance;
pub mod memory;
pub mod pinecone;


use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::config::VectorStoreConfig;
use crate::embeddings::DocumentChunk;
use crate::{RagError, Result};

pub use lance::LanceStore;
pub use memory::MemoryStore;
pub use pinecone::PineconeStore;

/// Where index records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Hosted Pinecone serverless index
    #[default]
    Pinecone,
    /// Local LanceDB tables under the configuration directory
    Lancedb,
    /// Process-local, lost on exit
    Memory,
}

impl VectorBackend {
    pub const ALL: [VectorBackend; 3] = [Self::Pinecone, Self::Lancedb, Self::Memory];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Pinecone => "pinecone",
            Self::Lancedb => "lancedb",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for VectorBackend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.as_str() == s)
            .ok_or_else(|| format!("Unknown vector backend: {}", s))
    }
}

/// Similarity measure an index is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    #[serde(rename = "dotproduct")]
    DotProduct,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 3] = [Self::Cosine, Self::Euclidean, Self::DotProduct];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dotproduct",
        }
    }

    /// Score two vectors of equal length
    ///
    /// Euclidean scores are squared distances, so smaller is closer.
    /// The other metrics are similarities where larger is closer.
    #[inline]
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match *self {
            Self::Cosine => {
                let norm_a = dot(a, a).sqrt();
                let norm_b = dot(b, b).sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot(a, b) / (norm_a * norm_b)
                }
            }
            Self::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::DotProduct => dot(a, b),
        }
    }

    /// Whether a larger score means a closer match
    #[inline]
    pub fn higher_is_closer(&self) -> bool {
        !matches!(self, Self::Euclidean)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| format!("Unknown distance metric: {}", s))
    }
}

/// Desired shape of an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub cloud: String,
    pub region: String,
}

impl IndexSpec {
    #[inline]
    pub fn from_config(config: &VectorStoreConfig, dimension: usize) -> Self {
        Self {
            name: config.index_name.clone(),
            dimension,
            metric: config.metric,
            cloud: config.cloud.clone(),
            region: config.region.clone(),
        }
    }
}

/// Outcome of `ensure_index`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Created,
    Existing,
}

/// Metadata stored next to every vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
    pub source: String,
    #[serde(deserialize_with = "integral")]
    pub page: u32,
    #[serde(deserialize_with = "integral")]
    pub chunk_index: u64,
    #[serde(deserialize_with = "integral")]
    pub start: u64,
    #[serde(deserialize_with = "integral")]
    pub end: u64,
    pub fingerprint: String,
}

/// Accept whole numbers that a service may hand back as floats
fn integral<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(D::Error::custom(format!(
            "expected a non-negative integer, got {}",
            value
        )));
    }
    T::try_from(value as u64).map_err(|_| D::Error::custom(format!("{} is out of range", value)))
}

/// A vector with its id and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    #[inline]
    pub fn from_chunk(chunk: &DocumentChunk, fingerprint: &str, values: Vec<f32>) -> Self {
        Self {
            id: record_id(fingerprint, chunk.page_number, chunk.chunk_index),
            values,
            metadata: RecordMetadata {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                page: chunk.page_number,
                chunk_index: chunk.chunk_index as u64,
                start: chunk.start as u64,
                end: chunk.end as u64,
                fingerprint: fingerprint.to_string(),
            },
        }
    }
}

/// A record returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Stable id for a chunk of a given document version
#[inline]
pub fn record_id(fingerprint: &str, page_number: u32, chunk_index: usize) -> String {
    let key = format!("{}:{}:{}", fingerprint, page_number, chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Pair chunks with their vectors in order
#[inline]
pub fn pair_records(
    chunks: &[DocumentChunk],
    fingerprint: &str,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<IndexRecord>> {
    if chunks.len() != vectors.len() {
        return Err(RagError::VectorStore(format!(
            "Got {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    Ok(chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| IndexRecord::from_chunk(chunk, fingerprint, values))
        .collect())
}

/// Fail on the first record whose vector length differs from `expected`
#[inline]
pub fn check_dimensions(records: &[IndexRecord], expected: usize) -> Result<()> {
    match records.iter().find(|r| r.values.len() != expected) {
        Some(record) => Err(RagError::DimensionMismatch {
            expected,
            actual: record.values.len(),
        }),
        None => Ok(()),
    }
}

/// Storage for embedded chunks, addressed by index and namespace
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> VectorBackend;

    /// Create the index unless one with this name exists
    ///
    /// An existing index with a different dimension is an error.
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexStatus>;

    /// Write records, replacing any with the same id
    ///
    /// Nothing is written when any vector has the wrong dimension.
    async fn upsert(&self, index: &str, namespace: &str, records: &[IndexRecord])
    -> Result<usize>;

    /// The `k` records closest to `vector`
    async fn search(
        &self,
        index: &str,
        namespace: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>>;

    async fn delete_namespace(&self, index: &str, namespace: &str) -> Result<()>;

    async fn count(&self, index: &str, namespace: &str) -> Result<usize>;
}
