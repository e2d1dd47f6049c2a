//! End-to-end tests for the retrieve → rerank → compose pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use adk_rerank::config::{ProviderKind, RerankConfig};
use adk_rerank::document::{Document, RerankResult};
use adk_rerank::error::{RerankError, Result};
use adk_rerank::pipeline::{FALLBACK_PROVIDER_NAME, FALLBACK_SCORE, RetrievalRerankPipeline};
use adk_rerank::reranker::RerankingProvider;
use adk_rerank::search::SimilaritySearch;
use async_trait::async_trait;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

struct StaticSearch {
    documents: Vec<Document>,
    delay: Option<Duration>,
    requested_top_k: AtomicUsize,
}

impl StaticSearch {
    fn new(documents: Vec<Document>) -> Self {
        Self { documents, delay: None, requested_top_k: AtomicUsize::new(0) }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SimilaritySearch for StaticSearch {
    async fn similarity_search(&self, _query: &str, top_k: usize) -> Result<Vec<Document>> {
        self.requested_top_k.store(top_k, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.documents.iter().take(top_k).cloned().collect())
    }

    fn backend_name(&self) -> &str {
        "static"
    }
}

struct FailingSearch;

#[async_trait]
impl SimilaritySearch for FailingSearch {
    async fn similarity_search(&self, _query: &str, _top_k: usize) -> Result<Vec<Document>> {
        Err(RerankError::Retrieval {
            backend: "failing".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// A reranker that always fails like an unreachable remote API.
struct UnreachableReranker {
    calls: AtomicUsize,
}

#[async_trait]
impl RerankingProvider for UnreachableReranker {
    fn provider_name(&self) -> &str {
        "remote"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn rerank(
        &self,
        _query: &str,
        _documents: &[Document],
        _top_k: usize,
    ) -> Result<Vec<RerankResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RerankError::RerankTransport {
            provider: "remote".to_string(),
            message: "connection reset".to_string(),
        })
    }
}

/// A reranker that never answers in time.
struct StalledReranker;

#[async_trait]
impl RerankingProvider for StalledReranker {
    fn provider_name(&self) -> &str {
        "stalled"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn rerank(
        &self,
        _query: &str,
        _documents: &[Document],
        _top_k: usize,
    ) -> Result<Vec<RerankResult>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

fn corpus(n: usize) -> Vec<Document> {
    (0..n).map(|i| Document::new(format!("passage number {i}"))).collect()
}

fn config(first_stage: usize, final_k: usize) -> RerankConfig {
    RerankConfig::builder().first_stage_top_k(first_stage).final_top_k(final_k).build().unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reranks_with_local_provider_by_default() {
    let search = Arc::new(StaticSearch::new(corpus(8)));
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config(50, 5))
        .search(search.clone())
        .build()
        .unwrap();

    let outcome = pipeline.query("passage").await.unwrap();

    assert_eq!(pipeline.reranker().provider_name(), "local");
    assert_eq!(search.requested_top_k.load(Ordering::SeqCst), 50);
    assert_eq!(outcome.candidate_count, 8);
    assert_eq!(outcome.results.len(), 5);
    assert!(!outcome.degraded);
    assert!(outcome.results.iter().all(|r| r.provider_name == "local"));
}

#[tokio::test]
async fn fewer_candidates_than_final_top_k() {
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config(50, 10))
        .search(Arc::new(StaticSearch::new(corpus(3))))
        .build()
        .unwrap();

    let results = pipeline.retrieve("passage").await.unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn rerank_failure_degrades_to_retrieval_order() {
    let reranker = Arc::new(UnreachableReranker { calls: AtomicUsize::new(0) });
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config(50, 4))
        .search(Arc::new(StaticSearch::new(corpus(10))))
        .reranker(reranker.clone())
        .build()
        .unwrap();

    let outcome = pipeline.query("passage").await.unwrap();

    assert_eq!(reranker.calls.load(Ordering::SeqCst), 1);
    assert!(outcome.degraded);
    assert_eq!(outcome.results.len(), 4);
    for (i, result) in outcome.results.iter().enumerate() {
        assert_eq!(result.provider_name, FALLBACK_PROVIDER_NAME);
        assert_eq!(result.relevance_score, FALLBACK_SCORE);
        assert_eq!(result.original_index, i);
        assert_eq!(result.new_index, i);
        assert_eq!(result.document.text, format!("passage number {i}"));
    }
    assert_eq!(
        outcome.context,
        "passage number 0\npassage number 1\npassage number 2\npassage number 3"
    );
}

#[tokio::test(start_paused = true)]
async fn rerank_timeout_degrades_instead_of_failing() {
    let config = RerankConfig::builder()
        .final_top_k(2)
        .rerank_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config)
        .search(Arc::new(StaticSearch::new(corpus(5))))
        .reranker(Arc::new(StalledReranker))
        .build()
        .unwrap();

    let outcome = pipeline.query("passage").await.unwrap();

    assert!(outcome.degraded);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.iter().all(|r| r.provider_name == FALLBACK_PROVIDER_NAME));
}

#[tokio::test]
async fn retrieval_failure_is_returned_unchanged() {
    let reranker = Arc::new(UnreachableReranker { calls: AtomicUsize::new(0) });
    let pipeline = RetrievalRerankPipeline::builder()
        .search(Arc::new(FailingSearch))
        .reranker(reranker.clone())
        .build()
        .unwrap();

    let err = pipeline.query("anything").await.unwrap_err();

    match err {
        RerankError::Retrieval { backend, message } => {
            assert_eq!(backend, "failing");
            assert_eq!(message, "connection refused");
        }
        other => panic!("expected retrieval error, got {other:?}"),
    }
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn retrieval_timeout_fails_the_query() {
    let config =
        RerankConfig::builder().retrieval_timeout(Duration::from_millis(200)).build().unwrap();
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config)
        .search(Arc::new(StaticSearch::new(corpus(5)).with_delay(Duration::from_secs(10))))
        .build()
        .unwrap();

    let err = pipeline.query("passage").await.unwrap_err();
    assert!(matches!(err, RerankError::Retrieval { ref backend, .. } if backend == "static"));
}

#[tokio::test(start_paused = true)]
async fn caller_deadline_bounds_both_stages() {
    let slow_search = RetrievalRerankPipeline::builder()
        .search(Arc::new(StaticSearch::new(corpus(5)).with_delay(Duration::from_secs(10))))
        .build()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(1);
    assert!(slow_search.query_with_deadline("passage", deadline).await.is_err());

    let slow_rerank = RetrievalRerankPipeline::builder()
        .config(config(50, 3))
        .search(Arc::new(StaticSearch::new(corpus(5))))
        .reranker(Arc::new(StalledReranker))
        .build()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(1);
    let outcome = slow_rerank.query_with_deadline("passage", deadline).await.unwrap();
    assert!(outcome.degraded);
    assert_eq!(outcome.results.len(), 3);
}

#[tokio::test]
async fn unbounded_timeouts_do_not_overflow() {
    let config = RerankConfig::builder()
        .final_top_k(2)
        .retrieval_timeout(Duration::MAX)
        .rerank_timeout(Duration::MAX)
        .build()
        .unwrap();
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config)
        .search(Arc::new(StaticSearch::new(corpus(4))))
        .build()
        .unwrap();

    let outcome = pipeline.query("passage").await.unwrap();
    assert!(!outcome.degraded);
    assert_eq!(outcome.results.len(), 2);

    let deadline = Instant::now() + Duration::from_secs(60);
    let outcome = pipeline.query_with_deadline("passage", deadline).await.unwrap();
    assert!(!outcome.degraded);
    assert_eq!(outcome.results.len(), 2);
}

#[tokio::test]
async fn empty_retrieval_yields_empty_outcome() {
    let reranker = Arc::new(UnreachableReranker { calls: AtomicUsize::new(0) });
    let pipeline = RetrievalRerankPipeline::builder()
        .search(Arc::new(StaticSearch::new(Vec::new())))
        .reranker(reranker.clone())
        .build()
        .unwrap();

    let outcome = pipeline.query("anything").await.unwrap();

    assert!(outcome.results.is_empty());
    assert!(!outcome.degraded);
    assert_eq!(outcome.context, "");
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn context_respects_max_chars() {
    let config = RerankConfig::builder().final_top_k(5).max_context_chars(40).build().unwrap();
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config)
        .search(Arc::new(StaticSearch::new(corpus(5))))
        .build()
        .unwrap();

    let outcome = pipeline.query("").await.unwrap();

    // Each passage is 16 chars: two fit with the separator (33), a third would need 50.
    assert_eq!(outcome.results.len(), 5);
    assert_eq!(outcome.context.lines().count(), 2);
    assert!(outcome.context.chars().count() <= 40);
}

#[tokio::test]
async fn remote_without_key_builds_local_pipeline() {
    let config = RerankConfig::builder().provider(ProviderKind::Remote).build().unwrap();
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config)
        .search(Arc::new(StaticSearch::new(corpus(2))))
        .build()
        .unwrap();

    assert_eq!(pipeline.reranker().provider_name(), "local");
    let outcome = pipeline.query("passage").await.unwrap();
    assert!(!outcome.degraded);
}

#[test]
fn builder_requires_search() {
    let err = RetrievalRerankPipeline::builder().build().err().unwrap();
    assert!(matches!(err, RerankError::Config(_)));
}
