//! Query-time retrieval: emotion-aware query expansion, over-fetch and rerank.

use std::sync::Arc;

use tracing::{error, info};

use crate::document::RetrievalResult;
use crate::error::Result;
use crate::handle::IndexHandle;
use crate::reranker::{LexicalOverlapReranker, NoOpReranker, Reranker};

/// Emotions that do not change the search query.
const NEUTRAL_EMOTIONS: [&str; 2] = ["unknown", "neutral"];

/// Append emotional context to `query` unless `emotion` is absent, blank,
/// `unknown` or `neutral` (case-insensitive).
pub fn expand_query(query: &str, emotion: Option<&str>) -> String {
    match emotion.map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) if !NEUTRAL_EMOTIONS.contains(&e.to_lowercase().as_str()) => {
            format!("{query} related to {e} emotion")
        }
        _ => query.to_string(),
    }
}

/// Retrieves ranked clinical references for a query.
#[derive(Clone)]
pub struct Retriever {
    handle: Arc<IndexHandle>,
    reranker: Arc<dyn Reranker>,
}

impl Retriever {
    /// Create a retriever that reranks with [`LexicalOverlapReranker`], or
    /// with [`NoOpReranker`] when the handle's config turns reranking off.
    pub fn new(handle: Arc<IndexHandle>) -> Self {
        let reranker: Arc<dyn Reranker> =
            if handle.config().rerank { Arc::new(LexicalOverlapReranker) } else { Arc::new(NoOpReranker) };
        Self { handle, reranker }
    }

    /// Replace the reranker.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    /// The index handle this retriever reads from.
    pub fn handle(&self) -> &Arc<IndexHandle> {
        &self.handle
    }

    /// Up to `k` results ordered by descending relevance.
    ///
    /// Never fails: any internal error is logged and yields an empty list.
    pub async fn retrieve(&self, query: &str, emotion: Option<&str>, k: usize) -> Vec<RetrievalResult> {
        match self.try_retrieve(query, emotion, k).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "error retrieving similar content");
                Vec::new()
            }
        }
    }

    /// Like [`Retriever::retrieve`] with the configured default `k`.
    pub async fn retrieve_default(&self, query: &str, emotion: Option<&str>) -> Vec<RetrievalResult> {
        self.retrieve(query, emotion, self.handle.config().top_k).await
    }

    /// The fallible core of [`Retriever::retrieve`].
    pub async fn try_retrieve(
        &self,
        query: &str,
        emotion: Option<&str>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let index = self.handle.ensure().await?;

        let enhanced = expand_query(query, emotion);
        info!(query = %enhanced, "searching clinical corpus");

        let embedding = self.handle.embedder().embed(&enhanced).await?;
        let fetch = self.handle.config().over_fetch(k);
        let candidates: Vec<RetrievalResult> = index
            .search(&embedding, fetch)?
            .into_iter()
            .map(|(chunk, _)| RetrievalResult {
                content: chunk.text.clone(),
                metadata: chunk.parent_metadata.clone(),
                relevance: 0.0,
            })
            .collect();

        let mut ranked = self.reranker.rerank(&enhanced, candidates).await?;
        ranked.truncate(k);
        info!(result_count = ranked.len(), "retrieved relevant documents");
        Ok(ranked)
    }
}
