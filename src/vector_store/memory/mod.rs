
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    IndexRecord, IndexSpec, IndexStatus, SearchResult, VectorBackend, VectorStore,
    check_dimensions,
};
use crate::{RagError, Result};

/// Brute-force store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

#[derive(Debug)]
struct MemoryIndex {
    spec: IndexSpec,
    namespaces: HashMap<String, BTreeMap<String, IndexRecord>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexes created so far
    #[inline]
    pub async fn index_count(&self) -> usize {
        self.indexes.read().await.len()
    }

    /// The `IndexSpec` an index was created with
    #[inline]
    pub async fn index_spec(&self, index: &str) -> Option<IndexSpec> {
        self.indexes
            .read()
            .await
            .get(index)
            .map(|entry| entry.spec.clone())
    }
}

fn missing_index(index: &str) -> RagError {
    RagError::VectorStore(format!("Index '{}' does not exist", index))
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn backend(&self) -> VectorBackend {
        VectorBackend::Memory
    }

    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexStatus> {
        let mut indexes = self.indexes.write().await;

        if let Some(existing) = indexes.get(&spec.name) {
            if existing.spec.dimension != spec.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: existing.spec.dimension,
                    actual: spec.dimension,
                });
            }
            debug!("Index '{}' already exists", spec.name);
            return Ok(IndexStatus::Existing);
        }

        indexes.insert(
            spec.name.clone(),
            MemoryIndex {
                spec: spec.clone(),
                namespaces: HashMap::new(),
            },
        );
        info!(
            "Created in-memory index '{}' ({} dimensions, {})",
            spec.name, spec.dimension, spec.metric
        );
        Ok(IndexStatus::Created)
    }

    async fn upsert(
        &self,
        index: &str,
        namespace: &str,
        records: &[IndexRecord],
    ) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes.get_mut(index).ok_or_else(|| missing_index(index))?;

        check_dimensions(records, entry.spec.dimension)?;

        let stored = entry.namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }

        debug!(
            "Upserted {} records into {}/{}",
            records.len(),
            index,
            namespace
        );
        Ok(records.len())
    }

    async fn search(
        &self,
        index: &str,
        namespace: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let indexes = self.indexes.read().await;
        let entry = indexes.get(index).ok_or_else(|| missing_index(index))?;

        if vector.len() != entry.spec.dimension {
            return Err(RagError::DimensionMismatch {
                expected: entry.spec.dimension,
                actual: vector.len(),
            });
        }

        let Some(records) = entry.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let metric = entry.spec.metric;
        let mut results: Vec<SearchResult> = records
            .values()
            .map(|record| SearchResult {
                id: record.id.clone(),
                score: metric.score(vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            let ordering = a.score.total_cmp(&b.score);
            if metric.higher_is_closer() {
                ordering.reverse()
            } else {
                ordering
            }
        });
        results.truncate(k);

        Ok(results)
    }

    async fn delete_namespace(&self, index: &str, namespace: &str) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes.get_mut(index).ok_or_else(|| missing_index(index))?;
        entry.namespaces.remove(namespace);
        Ok(())
    }

    async fn count(&self, index: &str, namespace: &str) -> Result<usize> {
        let indexes = self.indexes.read().await;
        let entry = indexes.get(index).ok_or_else(|| missing_index(index))?;
        Ok(entry.namespaces.get(namespace).map_or(0, BTreeMap::len))
    }
}
