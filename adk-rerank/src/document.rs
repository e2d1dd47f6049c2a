//! Data types for retrieved documents and reranked results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A retrieved passage of text with its metadata bag.
///
/// Documents are produced by a [`SimilaritySearch`](crate::SimilaritySearch)
/// backend and are never mutated by the reranking stage. Metadata keys the
/// local reranker understands:
///
/// - `distance` / `score`: prior similarity signal from the coarse stage
/// - `updated_at` / `created_at` / `timestamp`: recency, string or epoch number
/// - `title` / `author` / `source`: descriptive fields counted as quality signals
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    /// Create a document with the given text and no metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: HashMap::new() }
    }

    /// Attach a metadata entry, replacing any existing value for `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Read a metadata entry as a number.
    ///
    /// Accepts JSON numbers and strings holding a decimal number.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether `key` is present with a non-null value.
    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.get(key).is_some_and(|v| !v.is_null())
    }
}

/// The four sub-scores combined by the local reranker, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SubScores {
    /// Prior retrieval similarity.
    pub semantic: f32,
    /// Keyword relevance of the text to the query.
    pub lexical: f32,
    /// Length, punctuation and metadata richness heuristic.
    pub quality: f32,
    /// Recency of the document.
    pub freshness: f32,
}

/// A [`Document`] with its combined and per-factor local scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The scored document.
    pub document: Document,
    /// Position of the document in the coarse retrieval order.
    pub original_index: usize,
    /// Weighted sum of the sub-scores.
    pub final_score: f32,
    /// The individual factors behind `final_score`.
    pub subscores: SubScores,
}

/// A document placed by a reranking provider.
///
/// Within one result list `relevance_score` is non-increasing in `new_index`
/// order, and `new_index` 0 is the most relevant document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResult {
    /// The reranked document.
    pub document: Document,
    /// Position of the document in the input list.
    pub original_index: usize,
    /// Position of the document in the reranked list.
    pub new_index: usize,
    /// Relevance score assigned by the provider (higher is more relevant).
    pub relevance_score: f32,
    /// Name of the provider that produced the score.
    pub provider_name: String,
}
