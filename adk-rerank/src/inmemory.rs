//! In-memory similarity search using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `Vec` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small corpora.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::Document;
use crate::error::{RerankError, Result};
use crate::search::{EmbeddingProvider, SimilaritySearch};

const BACKEND_NAME: &str = "InMemory";

struct Entry {
    document: Document,
    embedding: Vec<f32>,
}

/// An in-memory vector store that answers [`SimilaritySearch`] queries.
///
/// Every returned document carries two extra metadata entries:
/// `score` (the cosine similarity) and `distance` (`1 − score`), so the
/// local reranker's semantic factor reflects the coarse stage.
///
/// # Example
///
/// ```rust,ignore
/// use adk_rerank::{InMemoryVectorStore, SimilaritySearch};
///
/// let store = InMemoryVectorStore::new(Arc::new(embedder));
/// store.add(documents).await?;
/// let candidates = store.similarity_search("query", 10).await?;
/// ```
pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    /// Create an empty store that embeds text with `embedder`.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder, entries: RwLock::new(Vec::new()) }
    }

    /// Embed and store documents. Insertion order breaks similarity ties.
    ///
    /// # Errors
    ///
    /// Returns [`RerankError::Embedding`] if the embedder fails, returns the
    /// wrong number of vectors, or returns vectors of the wrong length.
    pub async fn add(&self, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(embedding_error(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }

        let mut entries = self.entries.write().await;
        entries.extend(
            documents.into_iter().zip(embeddings).map(|(document, embedding)| Entry {
                document,
                embedding,
            }),
        );
        debug!(total = entries.len(), "documents added to in-memory store");
        Ok(())
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.embedder.dimensions();
        if embedding.len() != expected {
            return Err(embedding_error(format!(
                "expected {expected} dimensions, got {}",
                embedding.len()
            )));
        }
        Ok(())
    }
}

fn embedding_error(message: String) -> RerankError {
    RerankError::Embedding { provider: BACKEND_NAME.to_string(), message }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SimilaritySearch for InMemoryVectorStore {
    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<Document>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed_query(query).await?;
        self.check_dimensions(&query_embedding)?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &Entry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.embedding, &query_embedding), entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| {
                entry
                    .document
                    .clone()
                    .with_metadata("score", f64::from(score))
                    .with_metadata("distance", f64::from(1.0 - score))
            })
            .collect())
    }

    fn backend_name(&self) -> &str {
        BACKEND_NAME
    }
}
