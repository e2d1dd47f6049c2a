//! The reranking provider abstraction.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::document::{Document, RerankResult};
use crate::error::Result;

/// A strategy that reorders a candidate set by relevance to a query.
///
/// Every implementation honours the same contract:
///
/// - the result holds exactly `min(top_k, documents.len())` entries;
/// - results are sorted by `relevance_score` descending, and equal scores
///   keep their original retrieval order;
/// - an empty candidate set or `top_k == 0` yields an empty result without
///   doing any work;
/// - an empty query is valid.
///
/// Providers are built once at startup and shared across concurrent queries,
/// so implementations hold no per-query mutable state.
///
/// # Example
///
/// ```rust,ignore
/// use adk_rerank::{Document, LocalReranker, RerankingProvider};
///
/// let reranker = LocalReranker::default();
/// let results = reranker.rerank("vector search", &documents, 5).await?;
/// for r in &results {
///     println!("{} (was #{}) {:.3}", r.new_index, r.original_index, r.relevance_score);
/// }
/// ```
#[async_trait]
pub trait RerankingProvider: Send + Sync {
    /// Short identifier recorded on every [`RerankResult`].
    fn provider_name(&self) -> &str;

    /// Whether the provider is usable with its current configuration.
    fn is_available(&self) -> bool;

    /// Rerank `documents` against `query` and keep the best `top_k`.
    async fn rerank(
        &self,
        query: &str,
        documents: &[Document],
        top_k: usize,
    ) -> Result<Vec<RerankResult>>;
}

/// Order `(original_index, score)` pairs best first, keep `top_k`, and build
/// the results.
///
/// The sort is stable on original index, so exact ties keep retrieval order.
/// `NaN` scores sort last.
pub(crate) fn rank_stable(
    documents: &[Document],
    scored: impl IntoIterator<Item = (usize, f32)>,
    top_k: usize,
    provider_name: &str,
) -> Vec<RerankResult> {
    let mut scored: Vec<(usize, f32)> = scored.into_iter().collect();
    scored.sort_by(|(ia, a), (ib, b)| compare_scores(*a, *b).then_with(|| ia.cmp(ib)));
    scored.truncate(top_k);
    scored
        .into_iter()
        .enumerate()
        .map(|(new_index, (original_index, relevance_score))| RerankResult {
            document: documents[original_index].clone(),
            original_index,
            new_index,
            relevance_score,
            provider_name: provider_name.to_string(),
        })
        .collect()
}

/// Descending order with `NaN` last.
fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
