//! # mindscope-rag
//!
//! Retrieval over a clinical question/answer corpus.
//!
//! ## Overview
//!
//! - [`normalize()`] and [`topics::tag`] prepare text and topic labels
//! - [`CsvCorpus`] reads `Question_ID`, `Questions`, `Answers` rows
//! - [`RecursiveChunker`] splits `"Question: …\nAnswer: …"` documents
//! - [`VectorIndex`] embeds chunks into an HNSW graph with a bincode cache
//! - [`IndexHandle`] publishes the index lazily and single-flight
//! - [`Retriever`] expands queries with emotion context and reranks by
//!   lexical overlap
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mindscope_rag::{CsvCorpus, HashingEmbedder, IndexHandle, Retriever};
//!
//! let handle = IndexHandle::builder()
//!     .source(Arc::new(CsvCorpus::new("data/mental_health.csv")))
//!     .embedder(Arc::new(HashingEmbedder::default()))
//!     .cache_path("cache/index.bin")
//!     .build()?;
//! let retriever = Retriever::new(Arc::new(handle));
//! let results = retriever.retrieve("coping with panic", Some("fear"), 3).await;
//! ```

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod handle;
pub mod index;
pub mod normalize;
pub mod reranker;
pub mod retriever;
pub mod topics;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use corpus::{CorpusSource, CsvCorpus, documents_from_rows};
pub use document::{Chunk, ChunkMetadata, CorpusRow, QADocument, RetrievalResult};
pub use embedding::{EmbeddingProvider, HashingEmbedder, l2_normalize};
pub use error::{RagError, Result};
pub use handle::{IndexHandle, IndexHandleBuilder};
pub use index::VectorIndex;
pub use normalize::{normalize, terms};
pub use reranker::{LexicalOverlapReranker, NoOpReranker, Reranker};
pub use retriever::{Retriever, expand_query};

#[cfg(feature = "openai")]
pub use openai::OpenAiCompatibleEmbedder;
