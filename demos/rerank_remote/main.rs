//! # Rerank Remote Example
//!
//! Builds the pipeline from `RERANK_*` environment variables. With
//! `RERANK_PROVIDER=remote` and a `RERANK_API_KEY`, candidates are reranked by
//! a hosted model; without a key the factory falls back to the local
//! reranker, and if the remote call fails at query time the pipeline
//! degrades to the coarse order.
//!
//! Optional: `RERANK_PROVIDER`, `RERANK_API_KEY`, `RERANK_MODEL`, `RERANK_ENDPOINT`.
//!
//! Run: `RUST_LOG=info cargo run --example rerank_remote`

use std::sync::Arc;

use adk_rerank::{Document, RerankConfig, RetrievalRerankPipeline, SimilaritySearch};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// KeywordSearch: a toy coarse stage that keeps documents sharing a word
// with the query, in corpus order
// ---------------------------------------------------------------------------

struct KeywordSearch {
    documents: Vec<Document>,
}

#[async_trait::async_trait]
impl SimilaritySearch for KeywordSearch {
    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> adk_rerank::Result<Vec<Document>> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(self
            .documents
            .iter()
            .filter(|doc| {
                let text = doc.text.to_lowercase();
                words.iter().any(|w| text.contains(w.as_str()))
            })
            .take(top_k)
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &str {
        "keyword"
    }
}

fn faq() -> Vec<Document> {
    [
        "Refunds are issued to the original payment method within 5 business days.",
        "Shipping is free for orders above 50 euros.",
        "You can return unused items within 30 days for a full refund.",
        "Gift cards cannot be refunded or exchanged for cash.",
        "Our support team is available on weekdays from 9 to 17.",
        "Refund requests for digital goods are reviewed case by case.",
    ]
    .into_iter()
    .map(|text| Document::new(text).with_metadata("source", "faq"))
    .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = RerankConfig::from_env()?;
    info!(?config, "loaded configuration");

    let pipeline = RetrievalRerankPipeline::builder()
        .config(config)
        .search(Arc::new(KeywordSearch { documents: faq() }))
        .build()?;
    println!("Reranking with provider '{}'", pipeline.reranker().provider_name());

    let query = "how long does a refund take";
    let outcome = pipeline.query(query).await?;

    println!("\nQuery: \"{query}\"");
    if outcome.degraded {
        println!("  (reranking failed, showing retrieval order)");
    }
    for result in &outcome.results {
        println!(
            "  {}. [{} score={:.4}] {}",
            result.new_index + 1,
            result.provider_name,
            result.relevance_score,
            result.document.text,
        );
    }
    println!("\nContext handed to the model:\n{}", outcome.context);
    Ok(())
}
