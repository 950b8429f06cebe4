#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! Provisioning against the local LanceDB backend, including restarts

mod common;

use common::{DIMENSION, EchoGenerator, HashEmbedder, test_config};
use pdf_rag::config::Config;
use pdf_rag::database::Database;
use pdf_rag::ingest::IngestOutcome;
use pdf_rag::pipeline::Pipeline;
use pdf_rag::vector_store::{IndexStatus, LanceStore, VectorBackend, VectorStore};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_pipeline(config: &Config) -> (Pipeline, Arc<LanceStore>) {
    let store = Arc::new(
        LanceStore::open(config.vector_database_path(), config.vector_store.metric)
            .await
            .expect("lancedb opens"),
    );
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .expect("database opens");

    let pipeline = Pipeline::from_parts(
        config.clone(),
        Arc::new(HashEmbedder),
        store.clone(),
        Arc::new(EchoGenerator),
        database,
    );
    (pipeline, store)
}

async fn record_count(store: &LanceStore, config: &Config) -> usize {
    store
        .count(
            &config.vector_store.index_name,
            &config.vector_store.namespace,
        )
        .await
        .expect("count succeeds")
}

#[tokio::test]
async fn provisioning_survives_restart() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path(), VectorBackend::Lancedb);

    let first_report = {
        let (pipeline, store) = open_pipeline(&config).await;
        assert_eq!(
            pipeline.ensure_index().await.expect("index created"),
            IndexStatus::Created
        );
        let report = pipeline.provision(false).await.expect("provisioned");
        assert_eq!(report.outcome, IngestOutcome::Ingested);
        assert_eq!(record_count(&store, &config).await, report.chunks);
        report
    };

    let (pipeline, store) = open_pipeline(&config).await;
    assert_eq!(
        pipeline.ensure_index().await.expect("index reopened"),
        IndexStatus::Existing
    );

    let report = pipeline.provision(false).await.expect("second provision");
    assert_eq!(report.outcome, IngestOutcome::Skipped);
    assert_eq!(report.ingestion_id, first_report.ingestion_id);
    assert_eq!(record_count(&store, &config).await, first_report.chunks);
}

#[tokio::test]
async fn forced_reingestion_replaces_records() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path(), VectorBackend::Lancedb);
    let (pipeline, store) = open_pipeline(&config).await;

    let first = pipeline.provision(false).await.expect("provisioned");
    let forced = pipeline.provision(true).await.expect("forced");

    assert_eq!(forced.outcome, IngestOutcome::Ingested);
    assert_eq!(forced.chunks, first.chunks);
    assert_eq!(record_count(&store, &config).await, first.chunks);
}

#[tokio::test]
async fn search_returns_page_provenance() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path(), VectorBackend::Lancedb);
    let (pipeline, _store) = open_pipeline(&config).await;
    pipeline.provision(false).await.expect("provisioned");

    let results = pipeline
        .retriever()
        .retrieve_k("ALFWorld and WebShop imitation learning", 2)
        .await
        .expect("search succeeds");

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| (1..=3).contains(&r.metadata.page)));
    assert!(results.iter().all(|r| r.metadata.end > r.metadata.start));
    assert!(results.windows(2).all(|pair| pair[0].score >= pair[1].score));

    let status = pipeline.status().await.expect("status");
    assert_eq!(status.backend, VectorBackend::Lancedb);
    assert_eq!(status.dimension, DIMENSION);
}
