//! # Rerank Basic Example
//!
//! Demonstrates two-stage retrieval: a coarse similarity search over an
//! `InMemoryVectorStore`, then the `LocalReranker` reordering the candidates
//! by semantic, lexical, quality and freshness scores.
//!
//! Uses a deterministic `MockEmbeddingProvider` so it runs with **zero API keys**.
//!
//! Run: `cargo run --example rerank_basic`

use std::sync::Arc;

use adk_rerank::{
    Document, EmbeddingProvider, InMemoryVectorStore, LexicalScoring, RerankConfig,
    RetrievalRerankPipeline, SimilaritySearch,
};
use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: deterministic hash-based embeddings for demos/tests
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> adk_rerank::Result<Vec<f32>> {
        // Direction depends only on the text bytes, so results are repeatable
        // but carry no real meaning. The reranker has to do the real work.
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// Sample corpus
// ---------------------------------------------------------------------------

fn corpus() -> Vec<Document> {
    let now = Utc::now();
    vec![
        Document::new(
            "Rust is a systems programming language focused on safety, speed, and \
             concurrency. It achieves memory safety without a garbage collector through \
             its ownership system.",
        )
        .with_metadata("title", "About Rust")
        .with_metadata("updated_at", (now - Duration::days(200)).to_rfc3339()),
        Document::new(
            "Retrieval-Augmented Generation (RAG) combines a retrieval system with a \
             language model. A vector search finds candidate passages, a reranker \
             orders them by relevance, and the best ones become the model's context.",
        )
        .with_metadata("title", "RAG overview")
        .with_metadata("author", "docs team")
        .with_metadata("updated_at", (now - Duration::days(5)).to_rfc3339()),
        Document::new("Bananas are a good source of potassium.")
            .with_metadata("updated_at", (now - Duration::days(900)).timestamp()),
        Document::new(
            "A reranker scores each retrieved passage against the query. Cross-encoder \
             rerankers read the query and passage together, which is slower than vector \
             search but much more precise.",
        )
        .with_metadata("source", "blog")
        .with_metadata("updated_at", (now - Duration::days(40)).to_rfc3339()),
        Document::new(
            "Python is a high-level, interpreted programming language known for its \
             readability. It is widely used in data science and automation.",
        ),
        Document::new("Weekly team lunch moved to Thursday."),
    ]
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // -- 1. Fill the coarse store -----------------------------------------
    let store = Arc::new(InMemoryVectorStore::new(Arc::new(MockEmbeddingProvider::new(64))));
    store.add(corpus()).await?;
    println!("Stored {} documents", store.len().await);

    // -- 2. Configure the pipeline ----------------------------------------
    // Fetch every stored document in the coarse stage, keep the best three.
    let config = RerankConfig::builder()
        .first_stage_top_k(10)
        .final_top_k(3)
        .lexical(LexicalScoring::Bm25)
        .max_context_chars(600)
        .build()?;

    let pipeline =
        RetrievalRerankPipeline::builder().config(config).search(store.clone()).build()?;
    println!("Reranking with provider '{}'", pipeline.reranker().provider_name());

    // -- 3. Compare coarse and reranked order -----------------------------
    let queries = ["how does a reranker improve RAG retrieval", "memory safety in Rust"];

    for query in &queries {
        println!("\nQuery: \"{query}\"");

        println!("  coarse order:");
        for (i, doc) in store.similarity_search(query, 3).await?.iter().enumerate() {
            println!("    {}. {}", i + 1, preview(&doc.text));
        }

        let outcome = pipeline.query(query).await?;
        println!(
            "  reranked ({} candidates, degraded={}):",
            outcome.candidate_count, outcome.degraded
        );
        for result in &outcome.results {
            println!(
                "    {}. [score={:.4}] was #{} | {}",
                result.new_index + 1,
                result.relevance_score,
                result.original_index + 1,
                preview(&result.document.text),
            );
        }
        println!("  context: {} chars", outcome.context.chars().count());
    }

    println!("\nDone.");
    Ok(())
}

fn preview(text: &str) -> String {
    text.chars().take(70).collect()
}
