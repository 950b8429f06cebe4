#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::Page;
use crate::{RagError, Result};

/// Represents a chunk of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Path of the document the chunk was cut from
    pub source: String,
    /// 1-based page the chunk belongs to
    pub page_number: u32,
    /// Position of this chunk within the whole document
    pub chunk_index: usize,
    /// The chunk text, including the overlap carried from the previous chunk
    pub text: String,
    /// Character offset of the first character within the page
    pub start: usize,
    /// Character offset one past the last character within the page
    pub end: usize,
}

/// What to do with a run of text that contains no separator within `chunk_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizedRunPolicy {
    /// Cut the run at `chunk_size` characters
    #[default]
    Split,
    /// Emit the run as a single chunk longer than `chunk_size`
    Keep,
}

impl std::fmt::Display for OversizedRunPolicy {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            OversizedRunPolicy::Split => write!(f, "split"),
            OversizedRunPolicy::Keep => write!(f, "keep"),
        }
    }
}

/// Configuration for document chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Preferred cut point; chunks end right before an occurrence
    pub separator: String,
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters repeated from the end of the previous chunk
    pub chunk_overlap: usize,
    pub oversized_runs: OversizedRunPolicy,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            oversized_runs: OversizedRunPolicy::Split,
        }
    }
}

/// Character range of a chunk within its page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Chunk every page of a document, numbering chunks across the whole document
#[inline]
pub fn chunk_pages(
    source: &str,
    pages: &[Page],
    config: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>> {
    config
        .validate()
        .map_err(|e| RagError::Config(e.to_string()))?;

    let mut chunks = Vec::new();

    for page in pages {
        let chars: Vec<char> = page.text.chars().collect();

        for span in split_chars(&chars, config) {
            chunks.push(DocumentChunk {
                source: source.to_string(),
                page_number: page.page_number,
                chunk_index: chunks.len(),
                text: chars[span.start..span.end].iter().collect(),
                start: span.start,
                end: span.end,
            });
        }
    }

    debug!(
        "Chunked '{}' ({} pages) into {} chunks (avg {} chars)",
        source,
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| c.end - c.start).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Compute chunk spans for a single text
///
/// Offsets are in characters, not bytes. Assumes a validated config.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<TextSpan> {
    let chars: Vec<char> = text.chars().collect();
    split_chars(&chars, config)
}

fn split_chars(chars: &[char], config: &ChunkingConfig) -> Vec<TextSpan> {
    let separator: Vec<char> = config.separator.chars().collect();
    let mut spans = Vec::new();

    if is_blank(chars, &separator) {
        return spans;
    }

    let len = chars.len();
    let mut start = 0;

    loop {
        let limit = start + config.chunk_size;
        if limit >= len {
            spans.push(TextSpan { start, end: len });
            break;
        }

        // A cut must land past the overlap, otherwise the next chunk would not advance
        let min_end = start + config.chunk_overlap + 1;

        let end = match last_separator(chars, &separator, min_end, limit) {
            Some(end) => end,
            None => match config.oversized_runs {
                OversizedRunPolicy::Split => limit,
                OversizedRunPolicy::Keep => {
                    let end = next_separator(chars, &separator, limit).unwrap_or(len);
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        end - start,
                        config.chunk_size
                    );
                    end
                }
            },
        };

        spans.push(TextSpan { start, end });

        if end >= len || is_blank(&chars[end..], &separator) {
            break;
        }

        start = end - config.chunk_overlap;
    }

    spans
}

/// Rightmost position in `[min, max]` where the separator begins
fn last_separator(chars: &[char], separator: &[char], min: usize, max: usize) -> Option<usize> {
    if separator.is_empty() {
        return Some(max);
    }
    (min..=max).rev().find(|&pos| separator_at(chars, separator, pos))
}

/// Leftmost position after `from` where the separator begins
fn next_separator(chars: &[char], separator: &[char], from: usize) -> Option<usize> {
    if separator.is_empty() {
        return None;
    }
    (from + 1..chars.len()).find(|&pos| separator_at(chars, separator, pos))
}

fn separator_at(chars: &[char], separator: &[char], pos: usize) -> bool {
    chars
        .get(pos..pos + separator.len())
        .is_some_and(|window| window == separator)
}

fn is_blank(chars: &[char], separator: &[char]) -> bool {
    chars
        .iter()
        .all(|c| c.is_whitespace() || separator.contains(c))
}
