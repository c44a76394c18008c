//! Data types for corpus rows, Q&A documents, chunks, and retrieval results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// One raw row of the clinical Q&A corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusRow {
    /// Value of the `Question_ID` column, or the row position when absent.
    pub question_id: String,
    /// Value of the `Questions` column.
    pub question: String,
    /// Value of the `Answers` column.
    pub answer: String,
}

impl CorpusRow {
    /// Whether the row carries both a question and an answer.
    pub fn is_usable(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }
}

/// An immutable question/answer pair with its topic tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QADocument {
    /// Stable identifier taken from the corpus.
    pub id: String,
    /// The original question text.
    pub question_text: String,
    /// The original answer text.
    pub answer_text: String,
    /// Topic tags assigned by [`crate::topics::tag`].
    pub topics: BTreeSet<String>,
    /// Free-form provenance (corpus file name).
    pub source_metadata: String,
}

impl QADocument {
    /// The text that gets chunked and embedded.
    pub fn source_text(&self) -> String {
        format!("Question: {}\nAnswer: {}", self.question_text, self.answer_text)
    }

    /// Metadata shared by every chunk cut from this document.
    pub fn chunk_metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            question_id: self.id.clone(),
            question: self.question_text.clone(),
            normalized_question: normalize(&self.question_text),
            topics: self.topics.clone(),
        }
    }
}

/// Metadata a chunk inherits from its parent [`QADocument`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// The parent document id.
    pub question_id: String,
    /// The parent question, verbatim.
    pub question: String,
    /// The parent question after normalisation.
    pub normalized_question: String,
    /// The parent document's topic tags.
    pub topics: BTreeSet<String>,
}

impl ChunkMetadata {
    /// Topics joined with `", "` in sorted order.
    pub fn topic_list(&self) -> String {
        self.topics.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}

/// A segment of a [`QADocument`] with its L2-normalised embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// Metadata inherited from the parent document.
    pub parent_metadata: ChunkMetadata,
    /// Unit-length embedding vector.
    pub embedding_vector: Vec<f32>,
}

/// A retrieved chunk paired with its lexical relevance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The chunk text.
    pub content: String,
    /// Metadata of the chunk's parent document.
    pub metadata: ChunkMetadata,
    /// Fraction of query terms found in the chunk, in `[0, 1]`.
    pub relevance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_text_uses_question_answer_layout() {
        let doc = QADocument {
            id: "7".into(),
            question_text: "What is CBT?".into(),
            answer_text: "A form of therapy.".into(),
            topics: BTreeSet::from(["therapy".to_string()]),
            source_metadata: "corpus.csv".into(),
        };
        assert_eq!(doc.source_text(), "Question: What is CBT?\nAnswer: A form of therapy.");
        let meta = doc.chunk_metadata();
        assert_eq!(meta.normalized_question, "what is cbt");
        assert_eq!(meta.topic_list(), "therapy");
    }

    #[test]
    fn rows_missing_either_side_are_unusable() {
        let row = |q: &str, a: &str| CorpusRow {
            question_id: "1".into(),
            question: q.into(),
            answer: a.into(),
        };
        assert!(row("q", "a").is_usable());
        assert!(!row("", "a").is_usable());
        assert!(!row("q", "   ").is_usable());
    }
}
