//! Error types for the `mindscope-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or querying the clinical index.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The corpus file could not be opened or parsed.
    #[error("Corpus error ({}): {message}", path.display())]
    CorpusError {
        /// Location of the corpus file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The corpus contained no row with both a question and an answer.
    #[error("Corpus contains no usable question/answer rows")]
    EmptyCorpus,

    /// The persisted index cache could not be read, written or decoded.
    #[error("Index cache error ({}): {message}", path.display())]
    CacheError {
        /// Location of the cache file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the approximate nearest-neighbour index.
    #[error("Vector index error: {0}")]
    IndexError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
