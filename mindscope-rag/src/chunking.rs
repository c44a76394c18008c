//! Document chunking.
//!
//! [`RecursiveChunker`] splits hierarchically: paragraphs, lines, sentences,
//! words and finally characters. Sizes are measured in characters, never
//! bytes, so multi-byte text is never cut inside a code point.

use std::collections::VecDeque;

use crate::config::RagConfig;
use crate::document::{Chunk, QADocument};

/// Separators tried in order before falling back to a character split.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the indexer.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no text to index.
    fn chunk(&self, document: &QADocument) -> Vec<Chunk>;
}

/// Splits text hierarchically, merging small pieces up to `chunk_size`
/// characters and carrying up to `chunk_overlap` trailing characters into
/// the next chunk.
///
/// # Example
///
/// ```rust,ignore
/// use mindscope_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 100);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// A zero `chunk_size` is treated as 1.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    /// Create a chunker using the sizes from a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        split_and_merge(text, self.chunk_size, self.chunk_overlap, SEPARATORS)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &QADocument) -> Vec<Chunk> {
        let metadata = document.chunk_metadata();
        self.split_text(&document.source_text())
            .into_iter()
            .map(|text| Chunk {
                text,
                parent_metadata: metadata.clone(),
                embedding_vector: Vec::new(),
            })
            .collect()
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split text by a separator, then merge segments into chunks that respect
/// `chunk_size`. A segment that alone exceeds `chunk_size` is split further
/// with the next separator.
fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return finish(text).into_iter().collect();
    }
    let Some((separator, remaining)) = separators.split_first() else {
        return split_by_size(text, chunk_size, chunk_overlap);
    };

    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut window_len = 0;

    for segment in split_keeping_separator(text, separator) {
        let segment_len = char_len(segment);

        if segment_len > chunk_size {
            chunks.extend(finish(&join(&window)));
            window.clear();
            window_len = 0;
            chunks.extend(split_and_merge(segment, chunk_size, chunk_overlap, remaining));
            continue;
        }

        if window_len + segment_len > chunk_size && !window.is_empty() {
            chunks.extend(finish(&join(&window)));
            while window_len > chunk_overlap || window_len + segment_len > chunk_size {
                let Some((_, len)) = window.pop_front() else { break };
                window_len -= len;
            }
        }

        window.push_back((segment, segment_len));
        window_len += segment_len;
    }

    chunks.extend(finish(&join(&window)));
    chunks
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(s, _)| *s).collect()
}

fn finish(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character-based splitting with overlap.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.extend(finish(&chars[start..end].iter().collect::<String>()));
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use proptest::prelude::*;

    fn document(question: &str, answer: &str) -> QADocument {
        QADocument {
            id: "q1".into(),
            question_text: question.into(),
            answer_text: answer.into(),
            topics: BTreeSet::from(["anxiety".to_string()]),
            source_metadata: "test".into(),
        }
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = RecursiveChunker::new(1000, 100).chunk(&document("Why worry?", "It is normal."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Question: Why worry?\nAnswer: It is normal.");
        assert_eq!(chunks[0].parent_metadata.question_id, "q1");
        assert!(chunks[0].embedding_vector.is_empty());
    }

    #[test]
    fn long_answers_split_with_overlap() {
        let answer = (0..60).map(|i| format!("Sentence number {i} is here.")).collect::<Vec<_>>().join(" ");
        let chunker = RecursiveChunker::new(200, 50);
        let chunks = chunker.split_text(&answer);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail = pair[0].rsplit("Sentence").next().unwrap_or_default();
            assert!(pair[1].starts_with(&format!("Sentence{tail}")), "expected overlap carrying {tail:?}");
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let text = "é".repeat(25);
        let chunks = RecursiveChunker::new(10, 2).split_text(&text);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks.len(), 3);
    }

    proptest! {
        #[test]
        fn chunks_never_exceed_size(text in "[a-zé .!?\n]{0,600}", size in 20usize..120) {
            let overlap = size / 5;
            for chunk in RecursiveChunker::new(size, overlap).split_text(&text) {
                prop_assert!(chunk.chars().count() <= size);
                prop_assert!(!chunk.trim().is_empty());
            }
        }
    }
}
