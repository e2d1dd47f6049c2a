//! In-process multi-factor reranker.
//!
//! [`LocalReranker`] needs no network and no model. It combines four
//! sub-scores in `[0, 1]` with the configured [`ScoreWeights`]:
//!
//! | Factor | Source |
//! |--------|--------|
//! | semantic | `distance` (as `1 − distance`) or `score` metadata, else 0.7 |
//! | lexical | [`crate::bm25`] keyword relevance |
//! | quality | [`crate::quality::quality_score`] |
//! | freshness | [`crate::freshness::freshness_score`] |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bm25::lexical_scores;
use crate::config::{LexicalScoring, RerankConfig, ScoreWeights};
use crate::document::{Document, RerankResult, ScoredDocument, SubScores};
use crate::error::Result;
use crate::freshness::freshness_score;
use crate::quality::quality_score;
use crate::reranker::{RerankingProvider, rank_stable};

/// Provider name reported by [`LocalReranker`].
pub const LOCAL_PROVIDER_NAME: &str = "local";

/// Semantic score for documents without a prior similarity signal.
pub const NEUTRAL_SEMANTIC_SCORE: f32 = 0.7;

/// Semantic sub-score from the coarse retrieval signal in the metadata.
///
/// `distance` wins over `score`; the result is clamped to `[0, 1]`.
pub fn semantic_score(document: &Document) -> f32 {
    if let Some(distance) = document.metadata_f64("distance") {
        return (1.0 - distance as f32).clamp(0.0, 1.0);
    }
    if let Some(score) = document.metadata_f64("score") {
        return (score as f32).clamp(0.0, 1.0);
    }
    NEUTRAL_SEMANTIC_SCORE
}

/// A reranker that scores documents locally with weighted heuristics.
///
/// # Example
///
/// ```rust,ignore
/// use adk_rerank::{LocalReranker, LexicalScoring, ScoreWeights};
///
/// let reranker = LocalReranker::new(ScoreWeights::default(), LexicalScoring::Bm25)?;
/// let scored = reranker.score("ownership rules", &documents);
/// println!("lexical={:.2}", scored[0].subscores.lexical);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalReranker {
    weights: ScoreWeights,
    lexical: LexicalScoring,
    /// Fixed "now" for freshness; the wall clock when unset.
    reference_time: Option<DateTime<Utc>>,
}

impl LocalReranker {
    /// Create a reranker with the given weights and lexical mode.
    ///
    /// # Errors
    ///
    /// Returns [`RerankError::Config`](crate::RerankError::Config) if the
    /// weights are invalid. Weights not summing to 1.0 are normalized.
    pub fn new(weights: ScoreWeights, lexical: LexicalScoring) -> Result<Self> {
        Ok(Self { weights: weights.validate()?, lexical, reference_time: None })
    }

    /// Create a reranker from the `weights` and `lexical` fields of a
    /// configuration.
    ///
    /// The weights are validated again here, since a deserialized or
    /// hand-built [`RerankConfig`] never went through the builder.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(config: &RerankConfig) -> Result<Self> {
        Self::new(config.weights, config.lexical)
    }

    /// Use a different lexical scoring mode.
    pub fn with_lexical(mut self, lexical: LexicalScoring) -> Self {
        self.lexical = lexical;
        self
    }

    /// Pin the time freshness is measured against.
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    /// The weights in use.
    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Score every document, in input order, exposing the sub-scores.
    pub fn score(&self, query: &str, documents: &[Document]) -> Vec<ScoredDocument> {
        let now = self.reference_time.unwrap_or_else(Utc::now);
        let lexical = lexical_scores(self.lexical, query, documents);

        documents
            .iter()
            .zip(lexical)
            .enumerate()
            .map(|(original_index, (document, lexical))| {
                let subscores = SubScores {
                    semantic: semantic_score(document),
                    lexical,
                    quality: quality_score(document),
                    freshness: freshness_score(document, now),
                };
                ScoredDocument {
                    document: document.clone(),
                    original_index,
                    final_score: self.combine(&subscores),
                    subscores,
                }
            })
            .collect()
    }

    fn combine(&self, s: &SubScores) -> f32 {
        let w = &self.weights;
        w.semantic * s.semantic
            + w.lexical * s.lexical
            + w.quality * s.quality
            + w.freshness * s.freshness
    }
}

#[async_trait]
impl RerankingProvider for LocalReranker {
    fn provider_name(&self) -> &str {
        LOCAL_PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn rerank(
        &self,
        query: &str,
        documents: &[Document],
        top_k: usize,
    ) -> Result<Vec<RerankResult>> {
        if documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let scored = self.score(query, documents);
        for s in &scored {
            debug!(
                index = s.original_index,
                final_score = s.final_score,
                semantic = s.subscores.semantic,
                lexical = s.subscores.lexical,
                quality = s.subscores.quality,
                freshness = s.subscores.freshness,
                "scored document"
            );
        }

        let results = rank_stable(
            documents,
            scored.iter().map(|s| (s.original_index, s.final_score)),
            top_k,
            LOCAL_PROVIDER_NAME,
        );
        debug!(candidates = documents.len(), returned = results.len(), "local rerank complete");
        Ok(results)
    }
}
