//! The HNSW vector index over embedded corpus chunks.
//!
//! Vectors are L2-normalised, so cosine distance reduces to `1 - dot`.
//! An index is immutable once built; [`crate::handle::IndexHandle`] swaps
//! whole indexes rather than mutating one.

use std::io::Cursor;
use std::path::Path;

use instant_distance::{Builder, HnswMap, Search};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Chunk, QADocument};
use crate::embedding::{EmbeddingProvider, l2_normalize};
use crate::error::{RagError, Result};

/// Bumped whenever the on-disk layout changes.
const CACHE_FORMAT_VERSION: u32 = 1;

/// Chunks embedded per provider call.
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct IndexPoint(Vec<f32>);

impl instant_distance::Point for IndexPoint {
    fn distance(&self, other: &Self) -> f32 {
        1.0 - dot(&self.0, &other.0)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Identifies the embedding space an index was built in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct CacheHeader {
    format_version: u32,
    model_id: String,
    dimensions: usize,
}

#[derive(Serialize, Deserialize)]
struct CacheBody {
    chunks: Vec<Chunk>,
    graph: HnswMap<IndexPoint, usize>,
}

/// All embedded chunks plus the HNSW graph that points into them.
pub struct VectorIndex {
    header: CacheHeader,
    chunks: Vec<Chunk>,
    graph: HnswMap<IndexPoint, usize>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("model_id", &self.header.model_id)
            .field("dimensions", &self.header.dimensions)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl VectorIndex {
    /// Chunk, embed and index `documents`.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if no document yields a chunk
    /// - [`RagError::EmbeddingError`] if the provider fails or returns
    ///   vectors of the wrong size
    /// - [`RagError::IndexError`] if graph construction panics
    pub async fn build(
        documents: &[QADocument],
        chunker: &dyn Chunker,
        embedder: &dyn EmbeddingProvider,
        config: &RagConfig,
    ) -> Result<Self> {
        let mut chunks: Vec<Chunk> = documents.iter().flat_map(|d| chunker.chunk(d)).collect();
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let dimensions = embedder.dimensions();
        for batch in chunks.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: embedder.model_id(),
                    message: format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                });
            }
            for (chunk, mut vector) in batch.iter_mut().zip(vectors) {
                if vector.len() != dimensions {
                    return Err(RagError::EmbeddingError {
                        provider: embedder.model_id(),
                        message: format!(
                            "expected {dimensions} dimensions, got {}",
                            vector.len()
                        ),
                    });
                }
                l2_normalize(&mut vector);
                chunk.embedding_vector = vector;
            }
        }
        debug!(chunk_count = chunks.len(), "embedded corpus chunks");

        let points: Vec<IndexPoint> =
            chunks.iter().map(|c| IndexPoint(c.embedding_vector.clone())).collect();
        let values: Vec<usize> = (0..chunks.len()).collect();
        let (ef_construction, ef_search) = (config.ef_construction, config.ef_search);
        let graph = tokio::task::spawn_blocking(move || {
            Builder::default()
                .ef_construction(ef_construction)
                .ef_search(ef_search)
                .seed(42)
                .build(points, values)
        })
        .await
        .map_err(|e| RagError::IndexError(format!("graph construction failed: {e}")))?;

        info!(
            document_count = documents.len(),
            chunk_count = chunks.len(),
            model_id = %embedder.model_id(),
            "built vector index"
        );

        Ok(Self {
            header: CacheHeader {
                format_version: CACHE_FORMAT_VERSION,
                model_id: embedder.model_id(),
                dimensions,
            },
            chunks,
            graph,
        })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks. Built indexes never are.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Identifier of the embedding model the index was built with.
    pub fn model_id(&self) -> &str {
        &self.header.model_id
    }

    /// Embedding dimensionality.
    pub fn dimensions(&self) -> usize {
        self.header.dimensions
    }

    /// Up to `n` chunks nearest to `query`, closest first, paired with their
    /// cosine similarity.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if `query` has the wrong dimensionality.
    pub fn search(&self, query: &[f32], n: usize) -> Result<Vec<(&Chunk, f32)>> {
        if query.len() != self.header.dimensions {
            return Err(RagError::IndexError(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.header.dimensions
            )));
        }
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut point = IndexPoint(query.to_vec());
        l2_normalize(&mut point.0);
        let mut search = Search::default();
        Ok(self
            .graph
            .search(&point, &mut search)
            .take(n)
            .filter_map(|item| self.chunks.get(*item.value).map(|c| (c, 1.0 - item.distance)))
            .collect())
    }

    /// Persist the index to `path`, creating parent directories as needed.
    ///
    /// The file is written next to its destination and renamed into place,
    /// so readers never observe a partial cache.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let cache_error = |message: String| RagError::CacheError { path: path.to_path_buf(), message };

        let mut bytes = Vec::new();
        bincode::serialize_into(&mut bytes, &self.header).map_err(|e| cache_error(e.to_string()))?;
        bincode::serialize_into(
            &mut bytes,
            &CacheBodyRef { chunks: &self.chunks, graph: &self.graph },
        )
        .map_err(|e| cache_error(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| cache_error(e.to_string()))?;
        }
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, &bytes).await.map_err(|e| cache_error(e.to_string()))?;
        tokio::fs::rename(&staging, path).await.map_err(|e| cache_error(e.to_string()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "saved index cache");
        Ok(())
    }

    /// Read an index from `path`, accepting it only if it was built with the
    /// given embedding model and dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CacheError`] if the file is missing, unreadable,
    /// undecodable, or was built in a different embedding space.
    pub async fn load(path: &Path, model_id: &str, dimensions: usize) -> Result<Self> {
        let cache_error = |message: String| RagError::CacheError { path: path.to_path_buf(), message };

        let bytes = tokio::fs::read(path).await.map_err(|e| cache_error(e.to_string()))?;
        let mut cursor = Cursor::new(bytes.as_slice());

        let header: CacheHeader =
            bincode::deserialize_from(&mut cursor).map_err(|e| cache_error(e.to_string()))?;
        let expected = CacheHeader {
            format_version: CACHE_FORMAT_VERSION,
            model_id: model_id.to_string(),
            dimensions,
        };
        if header != expected {
            return Err(cache_error(format!(
                "cache built for {} ({} dims, format {}), expected {} ({} dims, format {})",
                header.model_id,
                header.dimensions,
                header.format_version,
                expected.model_id,
                expected.dimensions,
                expected.format_version
            )));
        }

        let body: CacheBody =
            bincode::deserialize_from(&mut cursor).map_err(|e| cache_error(e.to_string()))?;
        if body.chunks.is_empty() {
            return Err(cache_error("cache holds no chunks".to_string()));
        }

        debug!(path = %path.display(), chunk_count = body.chunks.len(), "loaded index cache");
        Ok(Self { header, chunks: body.chunks, graph: body.graph })
    }
}

#[derive(Serialize)]
struct CacheBodyRef<'a> {
    chunks: &'a [Chunk],
    graph: &'a HnswMap<IndexPoint, usize>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::chunking::RecursiveChunker;
    use crate::embedding::HashingEmbedder;

    fn doc(id: &str, q: &str, a: &str) -> QADocument {
        QADocument {
            id: id.into(),
            question_text: q.into(),
            answer_text: a.into(),
            topics: BTreeSet::new(),
            source_metadata: "test".into(),
        }
    }

    fn corpus() -> Vec<QADocument> {
        vec![
            doc("1", "What helps with panic attacks?", "Slow breathing and grounding exercises."),
            doc("2", "How is depression treated?", "Therapy, medication, or both."),
            doc("3", "Can I sleep better?", "Keep a regular schedule and avoid screens."),
        ]
    }

    async fn build() -> VectorIndex {
        VectorIndex::build(
            &corpus(),
            &RecursiveChunker::new(1000, 100),
            &HashingEmbedder::new(64),
            &RagConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn nearest_chunk_is_the_matching_question() {
        let index = build().await;
        assert_eq!(index.len(), 3);
        let query = HashingEmbedder::new(64).embed("How is depression treated").await.unwrap();
        let hits = index.search(&query, 2).unwrap();
        assert_eq!(hits[0].0.parent_metadata.question_id, "2");
        assert!(hits[0].1 >= hits[1].1);
    }

    #[tokio::test]
    async fn empty_document_set_is_rejected() {
        let err = VectorIndex::build(
            &[],
            &RecursiveChunker::new(1000, 100),
            &HashingEmbedder::new(64),
            &RagConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus));
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_an_error() {
        let index = build().await;
        assert!(matches!(index.search(&[1.0; 8], 1), Err(RagError::IndexError(_))));
    }

    #[tokio::test]
    async fn cache_round_trip_preserves_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.bin");
        let index = build().await;
        index.save(&path).await.unwrap();

        let loaded = VectorIndex::load(&path, index.model_id(), 64).await.unwrap();
        assert_eq!(loaded.len(), index.len());
        let query = HashingEmbedder::new(64).embed("panic attacks").await.unwrap();
        let before: Vec<_> = index.search(&query, 3).unwrap().into_iter().map(|(c, _)| c.text.clone()).collect();
        let after: Vec<_> = loaded.search(&query, 3).unwrap().into_iter().map(|(c, _)| c.text.clone()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn cache_from_other_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        build().await.save(&path).await.unwrap();
        let err = VectorIndex::load(&path, "another-model", 64).await.unwrap_err();
        assert!(matches!(err, RagError::CacheError { .. }));
    }

    #[tokio::test]
    async fn corrupt_cache_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"not an index").unwrap();
        assert!(VectorIndex::load(&path, "hashing-fnv1a-64", 64).await.is_err());
    }
}
