//! Pinecone serverless backend.
//!
//! Index management goes through the control plane; records are written
//! and queried on the per-index data plane host, which is looked up once
//! and cached.


use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    DistanceMetric, IndexRecord, IndexSpec, IndexStatus, RecordMetadata, SearchResult,
    VectorBackend, VectorStore, check_dimensions,
};
use crate::config::Config;
use crate::http::{ApiClient, ServiceError, endpoint};
use crate::{RagError, Result};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct PineconeStore {
    api: ApiClient,
    control_plane: Url,
    readiness_timeout: Duration,
    poll_interval: Duration,
    upsert_batch_size: usize,
    hosts: Mutex<HashMap<String, IndexHost>>,
}

#[derive(Debug, Clone)]
struct IndexHost {
    url: Url,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexDescription {
    name: String,
    dimension: usize,
    #[serde(default)]
    metric: Option<DistanceMetric>,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexState,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IndexState {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: DistanceMetric,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudRegion<'a>,
}

#[derive(Debug, Serialize)]
struct CloudRegion<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<RecordMetadata>,
}

#[derive(Debug, Deserialize)]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}

impl PineconeStore {
    #[inline]
    pub fn new(config: &Config, api_key: &str) -> Result<Self> {
        let control_plane = config
            .vector_store
            .control_plane_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let api = ApiClient::new(&config.http)
            .with_header("Api-Key", api_key)
            .with_header("X-Pinecone-API-Version", config.vector_store.api_version.as_str())
            .with_header("Accept", "application/json");

        Ok(Self {
            api,
            control_plane,
            readiness_timeout: Duration::from_secs(config.vector_store.readiness_timeout_secs),
            poll_interval: DEFAULT_POLL_INTERVAL,
            upsert_batch_size: config.vector_store.upsert_batch_size.max(1),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    #[inline]
    pub fn with_api_client(mut self, api: ApiClient) -> Self {
        self.api = api;
        self
    }

    /// How long to wait between readiness checks
    #[inline]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn control_url(&self, path: &str) -> Result<Url> {
        endpoint(&self.control_plane, path).map_err(RagError::VectorService)
    }

    fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let list: IndexList = self
            .api
            .get_json(&self.control_url("indexes")?)
            .map_err(RagError::VectorService)?;
        Ok(list.indexes)
    }

    fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        self.api
            .get_json(&self.control_url(&format!("indexes/{}", name))?)
            .map_err(RagError::VectorService)
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<IndexStatus> {
        let request = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: CloudRegion {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
        };

        match self.api.post(&self.control_url("indexes")?, &request) {
            Ok(_) => {
                info!(
                    "Created index '{}' ({} dimensions, {})",
                    spec.name, spec.dimension, spec.metric
                );
                Ok(IndexStatus::Created)
            }
            Err(ServiceError::Rejected { status: 409 }) => {
                info!("Index '{}' was created concurrently", spec.name);
                Ok(IndexStatus::Existing)
            }
            Err(e) => Err(RagError::VectorService(e)),
        }
    }

    async fn wait_until_ready(&self, name: &str) -> Result<IndexDescription> {
        let started = Instant::now();

        loop {
            let description = self.describe_index(name)?;
            if description.status.ready && !description.host.is_empty() {
                debug!("Index '{}' is ready at {}", name, description.host);
                return Ok(description);
            }

            if started.elapsed() >= self.readiness_timeout {
                return Err(RagError::VectorStore(format!(
                    "Index '{}' not ready after {:?} (state {})",
                    name,
                    self.readiness_timeout,
                    description.status.state.as_deref().unwrap_or("unknown")
                )));
            }

            debug!(
                "Index '{}' not ready yet (state {}), waiting",
                name,
                description.status.state.as_deref().unwrap_or("unknown")
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn remember(&self, description: &IndexDescription) -> Result<IndexHost> {
        let host = IndexHost {
            url: data_plane_url(&description.host)?,
            dimension: description.dimension,
        };
        if let Ok(mut hosts) = self.hosts.lock() {
            hosts.insert(description.name.clone(), host.clone());
        }
        Ok(host)
    }

    fn cached_host(&self, index: &str) -> Option<IndexHost> {
        self.hosts
            .lock()
            .ok()
            .and_then(|hosts| hosts.get(index).cloned())
    }

    async fn host(&self, index: &str) -> Result<IndexHost> {
        if let Some(host) = self.cached_host(index) {
            return Ok(host);
        }
        let description = self.wait_until_ready(index).await?;
        self.remember(&description)
    }

    fn data_url(host: &IndexHost, path: &str) -> Result<Url> {
        endpoint(&host.url, path).map_err(RagError::VectorService)
    }
}

/// Data plane base URL for an index host as reported by the control plane
fn data_plane_url(host: &str) -> Result<Url> {
    let raw = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    Url::parse(&raw).map_err(|e| RagError::VectorStore(format!("Invalid index host {}: {}", host, e)))
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn backend(&self) -> VectorBackend {
        VectorBackend::Pinecone
    }

    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexStatus> {
        let existing = self
            .list_indexes()?
            .into_iter()
            .find(|index| index.name == spec.name);

        let status = match existing {
            Some(index) => {
                debug!("Index '{}' already exists", index.name);
                if index.metric.is_some_and(|metric| metric != spec.metric) {
                    warn!(
                        "Index '{}' uses metric {:?}, configuration asks for {}",
                        index.name, index.metric, spec.metric
                    );
                }
                IndexStatus::Existing
            }
            None => self.create_index(spec)?,
        };

        let description = self.wait_until_ready(&spec.name).await?;
        if description.dimension != spec.dimension {
            return Err(RagError::DimensionMismatch {
                expected: description.dimension,
                actual: spec.dimension,
            });
        }
        self.remember(&description)?;

        Ok(status)
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

        let host = self.host(index).await?;
        check_dimensions(records, host.dimension)?;

        let url = Self::data_url(&host, "vectors/upsert")?;
        let mut written = 0;

        for batch in records.chunks(self.upsert_batch_size) {
            let response: UpsertResponse = self
                .api
                .post_json(
                    &url,
                    &UpsertRequest {
                        vectors: batch,
                        namespace,
                    },
                )
                .map_err(RagError::VectorService)?;
            written += response.upserted_count;
            debug!(
                "Upserted batch of {} records into {}/{}",
                batch.len(),
                index,
                namespace
            );
        }

        Ok(written)
    }

    async fn search(
        &self,
        index: &str,
        namespace: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let host = self.host(index).await?;
        if vector.len() != host.dimension {
            return Err(RagError::DimensionMismatch {
                expected: host.dimension,
                actual: vector.len(),
            });
        }

        let request = QueryRequest {
            namespace,
            vector,
            top_k: k,
            include_metadata: true,
        };
        let response: QueryResponse = self
            .api
            .post_json(&Self::data_url(&host, "query")?, &request)
            .map_err(RagError::VectorService)?;

        let mut results = Vec::with_capacity(response.matches.len());
        for matched in response.matches {
            match matched.metadata {
                Some(metadata) => results.push(SearchResult {
                    id: matched.id,
                    score: matched.score,
                    metadata,
                }),
                None => warn!("Match {} has no metadata, skipping", matched.id),
            }
        }

        Ok(results)
    }

    async fn delete_namespace(&self, index: &str, namespace: &str) -> Result<()> {
        let host = self.host(index).await?;
        let request = json!({ "deleteAll": true, "namespace": namespace });

        match self
            .api
            .post(&Self::data_url(&host, "vectors/delete")?, &request)
        {
            Ok(_) => {
                info!("Cleared namespace '{}' of index '{}'", namespace, index);
                Ok(())
            }
            Err(ServiceError::Rejected { status: 404 }) => {
                debug!("Namespace '{}' did not exist", namespace);
                Ok(())
            }
            Err(e) => Err(RagError::VectorService(e)),
        }
    }

    async fn count(&self, index: &str, namespace: &str) -> Result<usize> {
        let host = self.host(index).await?;
        let stats: IndexStats = self
            .api
            .post_json(&Self::data_url(&host, "describe_index_stats")?, &json!({}))
            .map_err(RagError::VectorService)?;

        Ok(stats
            .namespaces
            .get(namespace)
            .map_or(0, |ns| ns.vector_count))
    }
}
