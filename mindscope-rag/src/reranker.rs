//! Reranker trait and the lexical-overlap reranker used for retrieval.

use async_trait::async_trait;

use crate::document::RetrievalResult;
use crate::error::Result;
use crate::normalize::terms;

/// A reranker that re-scores and reorders retrieval candidates.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank candidates given the query the retriever searched with.
    ///
    /// Returns results in a new order with updated relevance.
    async fn rerank(&self, query: &str, results: Vec<RetrievalResult>) -> Result<Vec<RetrievalResult>>;
}

/// A no-op reranker that returns results unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(&self, _query: &str, results: Vec<RetrievalResult>) -> Result<Vec<RetrievalResult>> {
        Ok(results)
    }
}

/// Scores each candidate by the share of query terms it contains.
///
/// `relevance = |terms(q) ∩ terms(chunk)| / |terms(q)|`, or 0 when the query
/// has no terms. Sorting is stable, so equally relevant candidates keep their
/// vector-similarity order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOverlapReranker;

impl LexicalOverlapReranker {
    /// The relevance of `content` to `query`, in `[0, 1]`.
    pub fn score(query: &str, content: &str) -> f32 {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return 0.0;
        }
        let content_terms = terms(content);
        let shared = query_terms.intersection(&content_terms).count();
        shared as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl Reranker for LexicalOverlapReranker {
    async fn rerank(
        &self,
        query: &str,
        mut results: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>> {
        for result in &mut results {
            result.relevance = Self::score(query, &result.content);
        }
        results.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::document::ChunkMetadata;

    fn candidate(content: &str) -> RetrievalResult {
        RetrievalResult {
            content: content.into(),
            metadata: ChunkMetadata {
                question_id: content.into(),
                question: String::new(),
                normalized_question: String::new(),
                topics: BTreeSet::new(),
            },
            relevance: 0.0,
        }
    }

    #[test]
    fn score_is_share_of_query_terms() {
        assert_eq!(LexicalOverlapReranker::score("panic attack help", "Help for a PANIC attack."), 1.0);
        assert!((LexicalOverlapReranker::score("panic attack help", "panic") - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(LexicalOverlapReranker::score("?!", "anything"), 0.0);
    }

    #[tokio::test]
    async fn sorts_descending_and_keeps_ties_in_order() {
        let results = vec![candidate("sleep hygiene"), candidate("low mood"), candidate("mood and sleep"), candidate("diet")];
        let ranked = LexicalOverlapReranker.rerank("mood sleep", results).await.unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["mood and sleep", "sleep hygiene", "low mood", "diet"]);
    }

    #[tokio::test]
    async fn noop_passes_through() {
        let ranked = NoOpReranker.rerank("q", vec![candidate("a"), candidate("b")]).await.unwrap();
        assert_eq!(ranked[0].content, "a");
    }
}
