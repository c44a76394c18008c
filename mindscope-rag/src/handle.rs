//! Shared, lazily built access to the vector index.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::corpus::{CorpusSource, documents_from_rows};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Owns the published index and the machinery to (re)build it.
///
/// Readers only ever observe a fully built `Arc<VectorIndex>`. Builds are
/// single-flight: concurrent callers of [`IndexHandle::ensure`] wait on one
/// build instead of starting their own.
pub struct IndexHandle {
    current: RwLock<Option<Arc<VectorIndex>>>,
    build_gate: Mutex<()>,
    source: Arc<dyn CorpusSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    config: RagConfig,
    cache_path: Option<PathBuf>,
}

impl IndexHandle {
    /// Create a new builder for constructing an [`IndexHandle`].
    pub fn builder() -> IndexHandleBuilder {
        IndexHandleBuilder::default()
    }

    /// The retrieval configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The embedding provider used for both indexing and queries.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// The cache file location, if caching is enabled.
    pub fn cache_path(&self) -> Option<&PathBuf> {
        self.cache_path.as_ref()
    }

    /// The published index, if any.
    pub async fn current(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().await.clone()
    }

    /// Return the published index, loading it from cache or building it
    /// from the corpus on first use.
    ///
    /// # Errors
    ///
    /// Propagates corpus, embedding and indexing failures. The handle stays
    /// unset after a failure, so the next call tries again.
    pub async fn ensure(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.current().await {
            return Ok(index);
        }

        let _gate = self.build_gate.lock().await;
        if let Some(index) = self.current().await {
            return Ok(index);
        }

        let index = match self.load_cached().await {
            Some(index) => Arc::new(index),
            None => {
                warn!("vector index not initialised, building from corpus");
                self.build_and_cache().await?
            }
        };
        *self.current.write().await = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Build a fresh index from the corpus, publish it and overwrite the
    /// cache. The previous index stays published if the build fails.
    pub async fn rebuild(&self) -> Result<Arc<VectorIndex>> {
        let _gate = self.build_gate.lock().await;
        let index = self.build_and_cache().await?;
        *self.current.write().await = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Try the cache; any failure is logged and reported as absent.
    pub async fn load_cached(&self) -> Option<VectorIndex> {
        let path = self.cache_path.as_ref()?;
        match VectorIndex::load(path, &self.embedder.model_id(), self.embedder.dimensions()).await {
            Ok(index) => {
                info!(path = %path.display(), chunk_count = index.len(), "loaded vector index from cache");
                Some(index)
            }
            Err(e) => {
                warn!(error = %e, "index cache unusable, rebuilding");
                None
            }
        }
    }

    async fn build_and_cache(&self) -> Result<Arc<VectorIndex>> {
        let source = Arc::clone(&self.source);
        let rows = tokio::task::spawn_blocking(move || source.rows())
            .await
            .map_err(|e| RagError::IndexError(format!("corpus reader failed: {e}")))??;
        let documents = documents_from_rows(rows, &self.source.describe());
        if documents.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let index =
            VectorIndex::build(&documents, self.chunker.as_ref(), self.embedder.as_ref(), &self.config)
                .await?;

        if let Some(path) = &self.cache_path {
            if let Err(e) = index.save(path).await {
                warn!(error = %e, "failed to write index cache");
            }
        }
        Ok(Arc::new(index))
    }
}

/// Builder for constructing an [`IndexHandle`].
///
/// The corpus source and embedding provider are required. The chunker
/// defaults to a [`RecursiveChunker`] sized from the config.
#[derive(Default)]
pub struct IndexHandleBuilder {
    source: Option<Arc<dyn CorpusSource>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    config: Option<RagConfig>,
    cache_path: Option<PathBuf>,
}

impl IndexHandleBuilder {
    /// Set the corpus source (required).
    pub fn source(mut self, source: Arc<dyn CorpusSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the embedding provider (required).
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Override the chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the retrieval configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Enable the on-disk cache at `path`.
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Build the [`IndexHandle`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<IndexHandle> {
        let source = self
            .source
            .ok_or_else(|| RagError::ConfigError("corpus source is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedding provider is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(RecursiveChunker::from_config(&config)));

        Ok(IndexHandle {
            current: RwLock::new(None),
            build_gate: Mutex::new(()),
            source,
            embedder,
            chunker,
            config,
            cache_path: self.cache_path,
        })
    }
}
