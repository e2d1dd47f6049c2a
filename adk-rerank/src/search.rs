//! The coarse retrieval seam.

use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;

/// A similarity search backend used for first-stage retrieval.
///
/// Implementations wrap a vector store (Qdrant, pgvector, an in-memory
/// index, ...) and return the `top_k` documents most similar to the query.
/// Results must be ordered by descending similarity. Attaching a
/// `distance` or `score` metadata entry lets the local reranker reuse the
/// retrieval signal.
///
/// # Example
///
/// ```rust,ignore
/// use adk_rerank::SimilaritySearch;
///
/// let candidates = store.similarity_search("how do I rotate keys?", 50).await?;
/// ```
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return up to `top_k` documents ordered by descending similarity.
    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<Document>>;

    /// Name used in logs and retrieval errors.
    fn backend_name(&self) -> &str {
        "vector_store"
    }
}

/// Turns text into vectors for [`InMemoryVectorStore`](crate::InMemoryVectorStore).
///
/// Passages and queries go through separate methods because asymmetric
/// retrieval models (BGE, E5) prepend an instruction to the query only.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one stored passage.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a search query. Defaults to [`embed`](Self::embed).
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(query).await
    }

    /// Embed many passages. Calls [`embed`](Self::embed) in order unless
    /// overridden.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;
}
