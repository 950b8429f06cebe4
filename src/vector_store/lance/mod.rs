//! Local LanceDB backend: one table per index, namespaces as a column.


use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tracing::{debug, info, warn};

use super::{
    DistanceMetric, IndexRecord, IndexSpec, IndexStatus, RecordMetadata, SearchResult,
    VectorBackend, VectorStore, check_dimensions,
};
use crate::{RagError, Result};

const VECTOR_COLUMN: &str = "vector";
/// Schema metadata key holding the metric the table was created for
const METRIC_KEY: &str = "pdf_rag.metric";

pub struct LanceStore {
    connection: Connection,
    default_metric: DistanceMetric,
    metrics: Mutex<HashMap<String, DistanceMetric>>,
}

impl LanceStore {
    /// Open (or create) the database directory
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P, default_metric: DistanceMetric) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.to_string_lossy().to_string();
        debug!("Opening LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            default_metric,
            metrics: Mutex::new(HashMap::new()),
        })
    }

    fn metric(&self, index: &str) -> DistanceMetric {
        self.metrics
            .lock()
            .ok()
            .and_then(|metrics| metrics.get(index).copied())
            .unwrap_or(self.default_metric)
    }

    fn remember_metric(&self, index: &str, metric: DistanceMetric) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.insert(index.to_string(), metric);
        }
    }

    async fn table_exists(&self, index: &str) -> Result<bool> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(names.iter().any(|name| name == index))
    }

    async fn open_table(&self, index: &str) -> Result<Table> {
        self.connection
            .open_table(index)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Index '{}' does not exist: {}", index, e)))
    }

    async fn table_metric(table: &Table) -> Result<Option<DistanceMetric>> {
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        Ok(schema.metadata().get(METRIC_KEY).and_then(|name| {
            DistanceMetric::ALL
                .into_iter()
                .find(|metric| metric.as_str() == name)
        }))
    }

    async fn table_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == VECTOR_COLUMN)
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::Database("Could not find vector column or determine dimension".to_string())
            })
    }
}

fn schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("namespace", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, false),
        Field::new("chunk_index", DataType::UInt64, false),
        Field::new("start", DataType::UInt64, false),
        Field::new("end", DataType::UInt64, false),
        Field::new("fingerprint", DataType::Utf8, false),
    ]))
}

fn record_batch(namespace: &str, records: &[IndexRecord], dimension: usize) -> Result<RecordBatch> {
    let flat_values: Vec<f32> = records
        .iter()
        .flat_map(|record| record.values.iter().copied())
        .collect();
    let item = Arc::new(Field::new("item", DataType::Float32, true));
    let vectors = FixedSizeListArray::try_new(
        item,
        dimension as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|_| namespace),
        )),
        Arc::new(vectors),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.metadata.text.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.metadata.source.as_str()),
        )),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.metadata.page),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.metadata.chunk_index),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.metadata.start),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.metadata.end),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.metadata.fingerprint.as_str()),
        )),
    ];

    RecordBatch::try_new(schema(dimension), arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

/// Turn a LanceDB distance into the score reported to callers
///
/// Cosine and dot distances are `1 - similarity`; L2 distances are squared
/// and returned unchanged.
fn distance_to_score(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Euclidean => distance,
        DistanceMetric::Cosine | DistanceMetric::DotProduct => 1.0 - distance,
    }
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Euclidean => DistanceType::L2,
        DistanceMetric::DotProduct => DistanceType::Dot,
    }
}

fn parse_batch(batch: &RecordBatch, metric: DistanceMetric) -> Result<Vec<SearchResult>> {
    let ids = column::<StringArray>(batch, "id")?;
    let texts = column::<StringArray>(batch, "text")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<UInt32Array>(batch, "page")?;
    let chunk_indices = column::<UInt64Array>(batch, "chunk_index")?;
    let starts = column::<UInt64Array>(batch, "start")?;
    let ends = column::<UInt64Array>(batch, "end")?;
    let fingerprints = column::<StringArray>(batch, "fingerprint")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    Ok((0..batch.num_rows())
        .map(|row| {
            let distance = distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            SearchResult {
                id: ids.value(row).to_string(),
                score: distance_to_score(metric, distance),
                metadata: RecordMetadata {
                    text: texts.value(row).to_string(),
                    source: sources.value(row).to_string(),
                    page: pages.value(row),
                    chunk_index: chunk_indices.value(row),
                    start: starts.value(row),
                    end: ends.value(row),
                    fingerprint: fingerprints.value(row).to_string(),
                },
            }
        })
        .collect())
}

fn namespace_filter(namespace: &str) -> String {
    format!("namespace = '{}'", namespace.replace('\'', "''"))
}

#[async_trait]
impl VectorStore for LanceStore {
    fn backend(&self) -> VectorBackend {
        VectorBackend::Lancedb
    }

    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexStatus> {
        if self.table_exists(&spec.name).await? {
            let table = self.open_table(&spec.name).await?;
            let dimension = Self::table_dimension(&table).await?;
            if dimension != spec.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: spec.dimension,
                });
            }

            // Searches keep using the metric the table was built for
            let metric = match Self::table_metric(&table).await? {
                Some(stored) if stored != spec.metric => {
                    warn!(
                        "Table '{}' uses metric {}, configuration asks for {}",
                        spec.name, stored, spec.metric
                    );
                    stored
                }
                Some(stored) => stored,
                None => spec.metric,
            };
            self.remember_metric(&spec.name, metric);

            debug!("Table '{}' already exists", spec.name);
            return Ok(IndexStatus::Existing);
        }

        let schema = schema(spec.dimension);
        let mut metadata = schema.metadata().clone();
        metadata.insert(METRIC_KEY.to_string(), spec.metric.as_str().to_string());
        let schema = Arc::new(Schema::clone(&schema).with_metadata(metadata));

        self.connection
            .create_empty_table(&spec.name, schema)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        self.remember_metric(&spec.name, spec.metric);
        info!(
            "Created table '{}' with {} dimensions ({} metric)",
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
        if records.is_empty() {
            return Ok(0);
        }

        let table = self.open_table(index).await?;
        let dimension = Self::table_dimension(&table).await?;
        check_dimensions(records, dimension)?;

        let batch = record_batch(namespace, records, dimension)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let mut merge = table.merge_insert(&["id", "namespace"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Database(format!("Failed to upsert records: {}", e)))?;

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
        let table = self.open_table(index).await?;
        let dimension = Self::table_dimension(&table).await?;
        if vector.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        let metric = self.metric(index);
        let mut stream = table
            .vector_search(vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(distance_type(metric))
            .only_if(namespace_filter(namespace))
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            results.extend(parse_batch(&batch, metric)?);
        }

        debug!("Search in {}/{} returned {} results", index, namespace, results.len());
        Ok(results)
    }

    async fn delete_namespace(&self, index: &str, namespace: &str) -> Result<()> {
        let table = self.open_table(index).await?;
        table
            .delete(&namespace_filter(namespace))
            .await
            .map_err(|e| RagError::Database(format!("Failed to delete namespace: {}", e)))?;

        info!("Cleared namespace '{}' of table '{}'", namespace, index);
        Ok(())
    }

    async fn count(&self, index: &str, namespace: &str) -> Result<usize> {
        let table = self.open_table(index).await?;
        table
            .count_rows(Some(namespace_filter(namespace)))
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }
}
