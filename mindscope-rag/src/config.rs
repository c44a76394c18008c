//! Configuration for corpus indexing and retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Tuning parameters for the indexer and retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of results returned when the caller does not pass `k`.
    pub top_k: usize,
    /// Upper bound on the neighbours fetched before reranking (`min(2k, cap)`).
    pub over_fetch_cap: usize,
    /// Rescore candidates by query-term overlap. When off, vector-similarity
    /// order is kept.
    pub rerank: bool,
    /// HNSW construction beam width.
    pub ef_construction: usize,
    /// HNSW search beam width.
    pub ef_search: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 3,
            over_fetch_cap: 10,
            rerank: true,
            ef_construction: 100,
            ef_search: 100,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Number of neighbours to pull from the index for a request of `k` results.
    pub fn over_fetch(&self, k: usize) -> usize {
        k.saturating_mul(2).min(self.over_fetch_cap)
    }

    /// Check that the parameters are mutually consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `over_fetch_cap == 0`
    /// - either HNSW beam width is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.over_fetch_cap == 0 {
            return Err(RagError::ConfigError(
                "over_fetch_cap must be greater than zero".to_string(),
            ));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(RagError::ConfigError(
                "ef_construction and ef_search must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the target chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of results.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the over-fetch cap applied before reranking.
    pub fn over_fetch_cap(mut self, cap: usize) -> Self {
        self.config.over_fetch_cap = cap;
        self
    }

    /// Enable or disable lexical reranking.
    pub fn rerank(mut self, enabled: bool) -> Self {
        self.config.rerank = enabled;
        self
    }

    /// Set the HNSW construction beam width.
    pub fn ef_construction(mut self, ef: usize) -> Self {
        self.config.ef_construction = ef;
        self
    }

    /// Set the HNSW search beam width.
    pub fn ef_search(mut self, ef: usize) -> Self {
        self.config.ef_search = ef;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_clinical_corpus_settings() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 3);
        assert!(config.rerank);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn over_fetch_is_twice_k_capped_at_ten() {
        let config = RagConfig::default();
        assert_eq!(config.over_fetch(3), 6);
        assert_eq!(config.over_fetch(5), 10);
        assert_eq!(config.over_fetch(8), 10);
        assert_eq!(config.over_fetch(0), 0);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_zero_top_k() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
    }
}
