use super::*;

fn page(page_number: u32, text: &str) -> Page {
    Page {
        page_number,
        text: text.to_string(),
    }
}

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
        ..ChunkingConfig::default()
    }
}

/// Rebuild the original text from chunks by dropping each chunk's overlap prefix
fn reconstruct(chunks: &[String], overlap: usize) -> String {
    let mut rebuilt = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            rebuilt.push_str(chunk);
        } else {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
    }
    rebuilt
}

fn chunk_texts(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    split_text(text, config)
        .into_iter()
        .map(|span| chars[span.start..span.end].iter().collect())
        .collect()
}

fn sample_text() -> String {
    (0..60)
        .map(|i| format!("Line {} of the sample document with some words in it.", i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn short_text_is_single_chunk() {
    let chunks = chunk_texts("hello world", &config(100, 10));
    assert_eq!(chunks, vec!["hello world".to_string()]);
}

#[test]
fn blank_text_produces_no_chunks() {
    assert!(split_text("", &config(100, 10)).is_empty());
    assert!(split_text(" \n\n \t\n", &config(100, 10)).is_empty());
}

#[test]
fn chunks_respect_size_limit() {
    let text = sample_text();
    let config = config(200, 40);

    let chunks = chunk_texts(&text, &config);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
    }
}

#[test]
fn chunks_prefer_separator_boundaries() {
    let text = sample_text();
    let config = config(200, 0);

    let chunks = chunk_texts(&text, &config);

    // Every chunk after the first starts at a separator because nothing is repeated
    for chunk in chunks.iter().skip(1) {
        assert!(chunk.starts_with('\n'), "chunk does not start at a line: {:?}", chunk);
    }
}

#[test]
fn overlap_repeats_tail_of_previous_chunk() {
    let text = sample_text();
    let config = config(300, 50);

    let chunks = chunk_texts(&text, &config);

    for pair in chunks.windows(2) {
        let previous: Vec<char> = pair[0].chars().collect();
        let tail: String = previous[previous.len() - 50..].iter().collect();
        assert!(pair[1].starts_with(&tail));
    }
}

#[test]
fn reconstruction_drops_exactly_the_overlap() {
    let text = sample_text();

    for (size, overlap) in [(100, 0), (100, 99), (250, 30), (400, 200), (1000, 200)] {
        let chunks = chunk_texts(&text, &config(size, overlap));
        assert_eq!(
            reconstruct(&chunks, overlap),
            text,
            "size={} overlap={}",
            size,
            overlap
        );
    }
}

#[test]
fn reconstruction_handles_multibyte_text() {
    let text = "Überprüfung der Größe\nnaïve café résumé\n日本語のテキスト\n".repeat(20);
    let text = text.trim_end().to_string();
    let config = config(60, 15);

    let chunks = chunk_texts(&text, &config);

    assert!(chunks.len() > 1);
    assert_eq!(reconstruct(&chunks, 15), text);
}

#[test]
fn oversized_run_is_split_by_default() {
    let text = "A".repeat(1500);
    let chunks = chunk_texts(&text, &config(1000, 200));

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].len(), 1000);
    assert_eq!(&chunks[1][..200], &chunks[0][800..]);
    assert_eq!(reconstruct(&chunks, 200), text);
}

#[test]
fn oversized_run_is_kept_whole_when_configured() {
    let text = format!("{}\nshort tail", "B".repeat(1500));
    let config = ChunkingConfig {
        oversized_runs: OversizedRunPolicy::Keep,
        ..config(1000, 5)
    };

    let chunks = chunk_texts(&text, &config);

    assert_eq!(chunks[0], "B".repeat(1500));
    assert_eq!(chunks.len(), 2);
    assert!(chunks[1].ends_with("short tail"));
    assert_eq!(reconstruct(&chunks, 5), text);
}

#[test]
fn empty_separator_cuts_at_chunk_size() {
    let text = "abcdefghij".repeat(5);
    let config = ChunkingConfig {
        separator: String::new(),
        ..config(20, 5)
    };

    let chunks = chunk_texts(&text, &config);

    assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    assert_eq!(chunks[0].chars().count(), 20);
    assert_eq!(reconstruct(&chunks, 5), text);
}

#[test]
fn trailing_separators_do_not_start_a_chunk() {
    let text = format!("{}{}", "x".repeat(90), "\n".repeat(20));
    let chunks = chunk_texts(&text, &config(100, 10));

    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].starts_with(&"x".repeat(90)));
}

#[test]
fn chunk_pages_keeps_provenance() {
    let pages = vec![
        page(1, &"A".repeat(1500)),
        page(2, "Second page text."),
        page(3, "   "),
    ];

    let chunks = chunk_pages("docs/sample.pdf", &pages, &ChunkingConfig::default())
        .expect("chunking should succeed");

    let first_page: Vec<&DocumentChunk> = chunks.iter().filter(|c| c.page_number == 1).collect();
    assert!(first_page.len() >= 2);
    assert_eq!(&first_page[1].text[..200], &first_page[0].text[800..]);
    assert_eq!(first_page[1].start, 800);

    let second_page: Vec<&DocumentChunk> = chunks.iter().filter(|c| c.page_number == 2).collect();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].text, "Second page text.");
    assert_eq!(second_page[0].start, 0);
    assert_eq!(second_page[0].end, 17);

    assert!(chunks.iter().all(|c| c.page_number != 3));
    assert!(chunks.iter().all(|c| c.source == "docs/sample.pdf"));

    let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
}

#[test]
fn chunk_pages_rejects_invalid_config() {
    let pages = vec![page(1, "text")];
    let result = chunk_pages("doc.pdf", &pages, &config(100, 100));

    assert!(matches!(result, Err(RagError::Config(_))));
}
