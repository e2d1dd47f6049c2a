//! Two-stage retrieval pipeline.
//!
//! The [`RetrievalRerankPipeline`] answers one query in three strictly
//! ordered steps:
//!
//! 1. **Coarse retrieve**: ask the [`SimilaritySearch`] backend for
//!    `first_stage_top_k` candidates. Failure or timeout here is returned to
//!    the caller.
//! 2. **Rerank**: let the [`RerankingProvider`] keep the best
//!    `final_top_k`. Any failure or timeout here is logged and the pipeline
//!    degrades to the first `final_top_k` candidates in retrieval order,
//!    tagged with provider `"fallback"`.
//! 3. **Compose context**: join the final texts with newlines, up to
//!    `max_context_chars`, never cutting a document in half.
//!
//! Queries share no mutable state, so one pipeline can serve many concurrent
//! callers. Dropping the future returned by [`query`](RetrievalRerankPipeline::query)
//! cancels whichever stage is in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_rerank::{RerankConfig, RetrievalRerankPipeline};
//!
//! let pipeline = RetrievalRerankPipeline::builder()
//!     .config(RerankConfig::from_env()?)
//!     .search(Arc::new(store))
//!     .build()?;
//!
//! let outcome = pipeline.query("how do refunds work?").await?;
//! llm.answer(&outcome.context, "how do refunds work?").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::RerankConfig;
use crate::document::{Document, RerankResult};
use crate::error::{RerankError, Result};
use crate::factory::RerankerFactory;
use crate::reranker::RerankingProvider;
use crate::search::SimilaritySearch;

/// Provider name on results produced by the degraded path.
pub const FALLBACK_PROVIDER_NAME: &str = "fallback";

/// Relevance score given to every result on the degraded path.
pub const FALLBACK_SCORE: f32 = 0.5;

/// The result of one pipeline query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    /// Final documents, most relevant first.
    pub results: Vec<RerankResult>,
    /// Number of candidates the coarse stage returned.
    pub candidate_count: usize,
    /// Whether reranking failed and `results` follow the coarse order.
    pub degraded: bool,
    /// Newline-joined text of `results`, bounded by `max_context_chars`.
    pub context: String,
}

/// The retrieval-and-rerank orchestrator.
///
/// Construct one via [`RetrievalRerankPipeline::builder()`].
pub struct RetrievalRerankPipeline {
    config: RerankConfig,
    search: Arc<dyn SimilaritySearch>,
    reranker: Arc<dyn RerankingProvider>,
}

impl RetrievalRerankPipeline {
    /// Create a new [`RetrievalRerankPipelineBuilder`].
    pub fn builder() -> RetrievalRerankPipelineBuilder {
        RetrievalRerankPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    /// Return a reference to the selected reranking provider.
    pub fn reranker(&self) -> &Arc<dyn RerankingProvider> {
        &self.reranker
    }

    /// Run all three stages with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns the coarse search error unchanged, or
    /// [`RerankError::Retrieval`] if the search exceeds `retrieval_timeout`.
    /// Reranking problems never produce an error.
    pub async fn query(&self, query: &str) -> Result<RetrievalOutcome> {
        self.run(query, None).await
    }

    /// Like [`query`](Self::query), but both blocking stages also stop at
    /// `deadline`.
    ///
    /// Reaching the deadline during retrieval fails the query; reaching it
    /// during reranking degrades to the coarse order.
    pub async fn query_with_deadline(
        &self,
        query: &str,
        deadline: Instant,
    ) -> Result<RetrievalOutcome> {
        self.run(query, Some(deadline)).await
    }

    /// Run stages 1 and 2 only and return the final documents.
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RerankResult>> {
        Ok(self.run(query, None).await?.results)
    }

    async fn run(&self, query: &str, deadline: Option<Instant>) -> Result<RetrievalOutcome> {
        let candidates = self.coarse_retrieve(query, deadline).await?;
        let candidate_count = candidates.len();

        let reranked = self.rerank_candidates(query, &candidates, deadline).await;
        let (results, degraded) = match reranked {
            Ok(results) => (results, false),
            Err(e) => {
                warn!(
                    provider = self.reranker.provider_name(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "reranking failed, falling back to retrieval order"
                );
                (fallback_results(candidates, self.config.final_top_k), true)
            }
        };

        let context = compose_context(&results, self.config.max_context_chars);
        info!(
            candidate_count,
            result_count = results.len(),
            degraded,
            context_chars = context.chars().count(),
            "query completed"
        );

        Ok(RetrievalOutcome { results, candidate_count, degraded, context })
    }

    async fn coarse_retrieve(
        &self,
        query: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<Document>> {
        let top_k = self.config.first_stage_top_k;
        let backend = self.search.backend_name();
        let deadline = earliest(deadline, deadline_after(self.config.retrieval_timeout));

        let search = self.search.similarity_search(query, top_k);
        let result = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, search).await.map_err(|_| {
                RerankError::Retrieval {
                    backend: backend.to_string(),
                    message: "similarity search timed out".to_string(),
                }
            })?,
            None => search.await,
        };

        let mut candidates = result.inspect_err(|e| {
            error!(backend, error = %e, "coarse retrieval failed");
        })?;
        if candidates.len() > top_k {
            debug!(backend, returned = candidates.len(), top_k, "search returned extra candidates");
            candidates.truncate(top_k);
        }
        debug!(backend, candidates = candidates.len(), "coarse retrieval complete");
        Ok(candidates)
    }

    async fn rerank_candidates(
        &self,
        query: &str,
        candidates: &[Document],
        deadline: Option<Instant>,
    ) -> Result<Vec<RerankResult>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let top_k = self.config.final_top_k;
        let deadline = earliest(deadline, deadline_after(self.config.rerank_timeout));

        let rerank = self.reranker.rerank(query, candidates, top_k);
        let mut results = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, rerank).await.map_err(|_| {
                RerankError::RerankTransport {
                    provider: self.reranker.provider_name().to_string(),
                    message: "rerank timed out".to_string(),
                }
            })??,
            None => rerank.await?,
        };
        results.truncate(top_k);
        Ok(results)
    }
}

/// `now + timeout`, or no deadline when the sum is past what `Instant` can hold.
fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// The degraded result: the first `top_k` candidates in retrieval order with
/// a neutral score.
pub fn fallback_results(candidates: Vec<Document>, top_k: usize) -> Vec<RerankResult> {
    candidates
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(index, document)| RerankResult {
            document,
            original_index: index,
            new_index: index,
            relevance_score: FALLBACK_SCORE,
            provider_name: FALLBACK_PROVIDER_NAME.to_string(),
        })
        .collect()
}

/// Join result texts with `\n`, stopping before the first document that would
/// push the total past `max_chars` characters.
///
/// Documents are never truncated. If the first document alone is too long
/// the context is empty.
pub fn compose_context(results: &[RerankResult], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0usize;
    for (i, result) in results.iter().enumerate() {
        let text = &result.document.text;
        let separator = usize::from(i > 0);
        let needed = text.chars().count() + separator;
        if used + needed > max_chars {
            debug!(included = i, total = results.len(), max_chars, "context limit reached");
            break;
        }
        if separator == 1 {
            context.push('\n');
        }
        context.push_str(text);
        used += needed;
    }
    context
}

/// Builder for constructing a [`RetrievalRerankPipeline`].
///
/// `search` is required. `config` defaults to [`RerankConfig::default()`];
/// `reranker` defaults to whatever [`RerankerFactory::create`] picks for the
/// config.
#[derive(Default)]
pub struct RetrievalRerankPipelineBuilder {
    config: Option<RerankConfig>,
    search: Option<Arc<dyn SimilaritySearch>>,
    reranker: Option<Arc<dyn RerankingProvider>>,
}

impl RetrievalRerankPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RerankConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the coarse search backend.
    pub fn search(mut self, search: Arc<dyn SimilaritySearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Use a specific reranking provider instead of the factory's choice.
    pub fn reranker(mut self, reranker: Arc<dyn RerankingProvider>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RetrievalRerankPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RerankError::Config`] if no search backend was set.
    pub fn build(self) -> Result<RetrievalRerankPipeline> {
        let search =
            self.search.ok_or_else(|| RerankError::Config("search is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let reranker = self.reranker.unwrap_or_else(|| RerankerFactory::create(&config));

        Ok(RetrievalRerankPipeline { config, search, reranker })
    }
}
