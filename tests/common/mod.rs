//! Fakes shared by the integration tests

#![allow(dead_code)]

use pdf_rag::config::{Config, Secrets};
use pdf_rag::embeddings::Embedder;
use pdf_rag::http::ServiceError;
use pdf_rag::llm::AnswerGenerator;
use pdf_rag::session::ChatTurn;
use pdf_rag::vector_store::VectorBackend;
use pdf_rag::{RagError, Result};
use std::path::{Path, PathBuf};

pub const DIMENSION: usize = 16;

/// Deterministic bag-of-words embedding, identical texts map to identical vectors
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text.split_whitespace() {
            let bucket = word
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % DIMENSION] += 1.0;
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }
}

fn unavailable() -> RagError {
    RagError::Embedding(ServiceError::Transient {
        attempts: 3,
        message: "embedding service unavailable".to_string(),
    })
}

/// Embedder whose service is always down
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(unavailable())
    }

    fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(unavailable())
    }
}

/// Answers with the question and the number of context documents it saw
pub struct EchoGenerator;

impl AnswerGenerator for EchoGenerator {
    fn generate(&self, question: &str, context: &[String], history: &[ChatTurn]) -> Result<String> {
        Ok(format!(
            "{} [{} documents, {} earlier turns]",
            question,
            context.len(),
            history.len()
        ))
    }
}

pub const DOCUMENT_PAGES: [&str; 3] = [
    "ReAct prompts large language models to generate reasoning traces.\n\
     The traces are interleaved with task-specific actions.\n\
     Actions let the model query an external knowledge source.",
    "On HotpotQA and FEVER, ReAct overcomes hallucination.\n\
     It interacts with a simple Wikipedia API.\n\
     The resulting trajectories are more interpretable.",
    "On ALFWorld and WebShop, ReAct outperforms imitation learning.\n\
     It uses only one or two in-context examples.\n\
     Absolute success rates improve by 34% and 10%.",
];

/// Write a three page text document, pages separated by form feeds
pub fn write_document(dir: &Path) -> PathBuf {
    let path = dir.join("react.txt");
    std::fs::write(&path, DOCUMENT_PAGES.join("\x0c")).expect("should write document");
    path
}

/// Configuration rooted at `dir` with small chunks so every page splits
pub fn test_config(dir: &Path, backend: VectorBackend) -> Config {
    let mut config = Config {
        base_dir: dir.to_path_buf(),
        ..Config::default()
    };
    config.document.path = write_document(dir);
    config.chunking.chunk_size = 80;
    config.chunking.chunk_overlap = 10;
    config.vector_store.backend = backend;
    config.vector_store.top_k = 3;
    config.vector_store.upsert_batch_size = 4;
    config
}

pub fn test_secrets() -> Secrets {
    Secrets {
        cohere_api_key: Some("co-key".to_string()),
        pinecone_api_key: Some("pc-key".to_string()),
        groq_api_key: Some("gq-key".to_string()),
    }
}
