//! Configuration for reranking and the retrieval pipeline.
//!
//! A [`RerankConfig`] is built once at startup, either through
//! [`RerankConfig::builder()`] or from `RERANK_*` environment variables with
//! [`RerankConfig::from_env()`], and is read-only afterwards.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RerankError, Result};

/// Default remote rerank endpoint (SiliconFlow-compatible wire format).
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://api.siliconflow.cn/v1/rerank";

/// Default remote rerank model.
pub const DEFAULT_REMOTE_MODEL: &str = "BAAI/bge-reranker-v2-m3";

const WEIGHT_SUM_TOLERANCE: f32 = 1e-6;

/// Which reranking strategy the pipeline should use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The in-process multi-factor reranker.
    #[default]
    Local,
    /// A reranking model behind an HTTP API.
    Remote,
}

impl FromStr for ProviderKind {
    type Err = RerankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(RerankError::Config(format!("unknown rerank provider '{other}'"))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// How the local reranker computes its lexical sub-score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LexicalScoring {
    /// Saturating term frequency per document, no corpus statistics.
    #[default]
    TermFrequency,
    /// Okapi BM25 with IDF and average length taken from the candidate set.
    Bm25,
}

impl FromStr for LexicalScoring {
    type Err = RerankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tf" | "term_frequency" => Ok(Self::TermFrequency),
            "bm25" => Ok(Self::Bm25),
            other => Err(RerankError::Config(format!("unknown lexical scoring '{other}'"))),
        }
    }
}

/// Linear weights applied to the local reranker's sub-scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight of the prior retrieval similarity.
    pub semantic: f32,
    /// Weight of the keyword relevance.
    pub lexical: f32,
    /// Weight of the quality heuristic.
    pub quality: f32,
    /// Weight of the recency score.
    pub freshness: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { semantic: 0.4, lexical: 0.3, quality: 0.2, freshness: 0.1 }
    }
}

impl ScoreWeights {
    /// Create a new set of weights. Call [`validate`](Self::validate) before use.
    pub fn new(semantic: f32, lexical: f32, quality: f32, freshness: f32) -> Self {
        Self { semantic, lexical, quality, freshness }
    }

    /// Sum of all four weights.
    pub fn sum(&self) -> f32 {
        self.semantic + self.lexical + self.quality + self.freshness
    }

    /// Check the weights and normalize them to sum to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`RerankError::Config`] if any weight is negative or not
    /// finite, or if all weights are zero.
    pub fn validate(self) -> Result<Self> {
        let all = [self.semantic, self.lexical, self.quality, self.freshness];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RerankError::Config(format!(
                "rerank weights must be finite and non-negative, got {self:?}"
            )));
        }
        let sum = self.sum();
        if sum <= 0.0 {
            return Err(RerankError::Config("rerank weights must not all be zero".to_string()));
        }
        if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
            return Ok(self);
        }
        warn!(sum, "rerank weights do not sum to 1.0, normalizing");
        Ok(Self {
            semantic: self.semantic / sum,
            lexical: self.lexical / sum,
            quality: self.quality / sum,
            freshness: self.freshness / sum,
        })
    }
}

/// Configuration parameters for reranking and the retrieval pipeline.
///
/// Deserializing fills missing fields from [`RerankConfig::default()`]. A
/// deserialized config skips the builder's checks; consumers validate the
/// parts they use.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankConfig {
    /// Number of candidates requested from the coarse similarity search.
    pub first_stage_top_k: usize,
    /// Number of documents kept after reranking.
    pub final_top_k: usize,
    /// Requested reranking strategy.
    pub provider: ProviderKind,
    /// Bearer token for the remote reranking API.
    pub remote_api_key: Option<String>,
    /// Model name sent to the remote reranking API.
    pub remote_model: String,
    /// URL of the remote reranking API.
    pub remote_endpoint: String,
    /// Per-request timeout for the remote reranking API.
    pub remote_timeout: Duration,
    /// Retries after a failed remote call (transport errors, 429 and 5xx only).
    pub remote_max_retries: u32,
    /// Sub-score weights for the local reranker.
    pub weights: ScoreWeights,
    /// Lexical scoring mode for the local reranker.
    pub lexical: LexicalScoring,
    /// Upper bound on the composed context, in characters.
    pub max_context_chars: usize,
    /// Bound on the coarse retrieval call.
    pub retrieval_timeout: Option<Duration>,
    /// Bound on the rerank call; exceeding it degrades to the coarse order.
    pub rerank_timeout: Option<Duration>,
}

// The API key stays out of logs.
impl fmt::Debug for RerankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerankConfig")
            .field("first_stage_top_k", &self.first_stage_top_k)
            .field("final_top_k", &self.final_top_k)
            .field("provider", &self.provider)
            .field("remote_api_key", &self.remote_api_key.as_ref().map(|_| "<redacted>"))
            .field("remote_model", &self.remote_model)
            .field("remote_endpoint", &self.remote_endpoint)
            .field("remote_timeout", &self.remote_timeout)
            .field("remote_max_retries", &self.remote_max_retries)
            .field("weights", &self.weights)
            .field("lexical", &self.lexical)
            .field("max_context_chars", &self.max_context_chars)
            .field("retrieval_timeout", &self.retrieval_timeout)
            .field("rerank_timeout", &self.rerank_timeout)
            .finish()
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            first_stage_top_k: 50,
            final_top_k: 5,
            provider: ProviderKind::Local,
            remote_api_key: None,
            remote_model: DEFAULT_REMOTE_MODEL.to_string(),
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            remote_timeout: Duration::from_secs(30),
            remote_max_retries: 2,
            weights: ScoreWeights::default(),
            lexical: LexicalScoring::TermFrequency,
            max_context_chars: 8000,
            retrieval_timeout: None,
            rerank_timeout: None,
        }
    }
}

impl RerankConfig {
    /// Create a new builder for constructing a [`RerankConfig`].
    pub fn builder() -> RerankConfigBuilder {
        RerankConfigBuilder::default()
    }

    /// Build a configuration from `RERANK_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `RERANK_PROVIDER` | `provider` (`local` / `remote`) |
    /// | `RERANK_API_KEY` | `remote_api_key` |
    /// | `RERANK_MODEL` | `remote_model` |
    /// | `RERANK_ENDPOINT` | `remote_endpoint` |
    /// | `RERANK_FIRST_STAGE_TOP_K` | `first_stage_top_k` |
    /// | `RERANK_FINAL_TOP_K` | `final_top_k` |
    /// | `RERANK_MAX_CONTEXT_CHARS` | `max_context_chars` |
    /// | `RERANK_LEXICAL` | `lexical` (`tf` / `bm25`) |
    ///
    /// Unset or empty variables keep their defaults. An unknown provider name
    /// falls back to `local`; negative counts are clamped to zero.
    ///
    /// # Errors
    ///
    /// Returns [`RerankError::Config`] if a numeric variable is not an
    /// integer or the resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(raw) = get("RERANK_PROVIDER") {
            let provider = raw.parse::<ProviderKind>().unwrap_or_else(|e| {
                warn!(error = %e, "falling back to local rerank provider");
                ProviderKind::Local
            });
            builder = builder.provider(provider);
        }
        if let Some(key) = get("RERANK_API_KEY") {
            builder = builder.remote_api_key(key);
        }
        if let Some(model) = get("RERANK_MODEL") {
            builder = builder.remote_model(model);
        }
        if let Some(endpoint) = get("RERANK_ENDPOINT") {
            builder = builder.remote_endpoint(endpoint);
        }
        if let Some(raw) = get("RERANK_FIRST_STAGE_TOP_K") {
            builder = builder.first_stage_top_k(parse_count("RERANK_FIRST_STAGE_TOP_K", &raw)?);
        }
        if let Some(raw) = get("RERANK_FINAL_TOP_K") {
            builder = builder.final_top_k(parse_count("RERANK_FINAL_TOP_K", &raw)?);
        }
        if let Some(raw) = get("RERANK_MAX_CONTEXT_CHARS") {
            builder = builder.max_context_chars(parse_count("RERANK_MAX_CONTEXT_CHARS", &raw)?);
        }
        if let Some(raw) = get("RERANK_LEXICAL") {
            builder = builder.lexical(raw.parse()?);
        }

        builder.build()
    }
}

fn parse_count(name: &str, raw: &str) -> Result<usize> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| RerankError::Config(format!("{name} must be an integer, got '{raw}'")))?;
    if value < 0 {
        warn!(variable = name, value, "negative count clamped to zero");
    }
    Ok(usize::try_from(value.max(0)).unwrap_or(usize::MAX))
}

/// Builder for constructing a validated [`RerankConfig`].
#[derive(Debug, Clone, Default)]
pub struct RerankConfigBuilder {
    config: RerankConfig,
}

impl RerankConfigBuilder {
    /// Set the number of candidates fetched by the coarse search.
    pub fn first_stage_top_k(mut self, k: usize) -> Self {
        self.config.first_stage_top_k = k;
        self
    }

    /// Set the number of documents kept after reranking.
    pub fn final_top_k(mut self, k: usize) -> Self {
        self.config.final_top_k = k;
        self
    }

    /// Set the reranking strategy.
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.config.provider = provider;
        self
    }

    /// Set the remote API key.
    pub fn remote_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.remote_api_key = Some(key.into());
        self
    }

    /// Set the remote model name.
    pub fn remote_model(mut self, model: impl Into<String>) -> Self {
        self.config.remote_model = model.into();
        self
    }

    /// Set the remote endpoint URL.
    pub fn remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.remote_endpoint = endpoint.into();
        self
    }

    /// Set the per-request remote timeout.
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.config.remote_timeout = timeout;
        self
    }

    /// Set how many times a failed remote call is retried.
    pub fn remote_max_retries(mut self, retries: u32) -> Self {
        self.config.remote_max_retries = retries;
        self
    }

    /// Set the local sub-score weights.
    pub fn weights(mut self, weights: ScoreWeights) -> Self {
        self.config.weights = weights;
        self
    }

    /// Set the lexical scoring mode.
    pub fn lexical(mut self, lexical: LexicalScoring) -> Self {
        self.config.lexical = lexical;
        self
    }

    /// Set the maximum composed context length in characters.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Bound the coarse retrieval call.
    pub fn retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.config.retrieval_timeout = Some(timeout);
        self
    }

    /// Bound the rerank call.
    pub fn rerank_timeout(mut self, timeout: Duration) -> Self {
        self.config.rerank_timeout = Some(timeout);
        self
    }

    /// Build the [`RerankConfig`], validating that parameters are consistent.
    ///
    /// Weights that are valid but do not sum to 1.0 are normalized.
    ///
    /// # Errors
    ///
    /// Returns [`RerankError::Config`] if:
    /// - `max_context_chars == 0`
    /// - the weights are negative, non-finite, or all zero
    pub fn build(mut self) -> Result<RerankConfig> {
        if self.config.max_context_chars == 0 {
            return Err(RerankError::Config(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        self.config.weights = self.config.weights.validate()?;
        Ok(self.config)
    }
}
