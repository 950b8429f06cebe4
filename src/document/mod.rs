//! Document loading: turns a file on disk into ordered page texts.


use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{RagError, Result};

/// Page separator used by plain text documents
const FORM_FEED: char = '\x0c';

/// Text of one page, numbered from 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// A loaded document with the digest of the bytes it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub fingerprint: String,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("txt") | Some("md") => Self::Text,
            _ => Self::Pdf,
        }
    }
}

/// Load a document and compute its fingerprint from the same read
#[inline]
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<LoadedDocument> {
    let path = path.as_ref();
    let bytes = read_bytes(path)?;
    let fingerprint = digest(&bytes);

    let pages = match DocumentFormat::from_path(path) {
        DocumentFormat::Pdf => parse_pdf(path, &bytes)?,
        DocumentFormat::Text => parse_text(path, bytes)?,
    };

    info!(
        "Loaded {} pages from {} (fingerprint {})",
        pages.len(),
        path.display(),
        &fingerprint[..12]
    );

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        fingerprint,
        pages,
    })
}

/// Ordered page records of a document
#[inline]
pub fn load_pages<P: AsRef<Path>>(path: P) -> Result<Vec<Page>> {
    load_document(path).map(|document| document.pages)
}

/// SHA-256 hex digest of the file contents
#[inline]
pub fn fingerprint<P: AsRef<Path>>(path: P) -> Result<String> {
    let bytes = read_bytes(path.as_ref())?;
    Ok(digest(&bytes))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(RagError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(RagError::Parse(format!("{} is not a file", path.display())));
    }
    Ok(std::fs::read(path)?)
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn parse_pdf(path: &Path, bytes: &[u8]) -> Result<Vec<Page>> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| RagError::Parse(format!("{}: {}", path.display(), e)))?;

    if document.is_encrypted() {
        return Err(RagError::Parse(format!(
            "{}: encrypted documents are not supported",
            path.display()
        )));
    }

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(RagError::Parse(format!(
            "{}: document has no pages",
            path.display()
        )));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_number in page_numbers {
        let text = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Could not extract text from page {} of {}: {}",
                    page_number,
                    path.display(),
                    e
                );
                String::new()
            }
        };
        debug!("Page {}: {} characters", page_number, text.chars().count());
        pages.push(Page { page_number, text });
    }

    Ok(pages)
}

fn parse_text(path: &Path, bytes: Vec<u8>) -> Result<Vec<Page>> {
    let content = String::from_utf8(bytes)
        .map_err(|e| RagError::Parse(format!("{}: {}", path.display(), e)))?;

    Ok(content
        .split(FORM_FEED)
        .zip(1..)
        .map(|(text, page_number)| Page {
            page_number,
            text: text.to_string(),
        })
        .collect())
}
