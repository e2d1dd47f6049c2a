//! # adk-rerank
//!
//! Two-stage retrieval for ADK agents: a coarse vector similarity search
//! followed by a precision reranking step that produces the context handed
//! to the language model.
//!
//! ## Components
//!
//! - [`RerankingProvider`]: the pluggable reranking strategy
//!   - [`LocalReranker`]: weighted semantic, lexical, quality and freshness
//!     scores computed in-process
//!   - [`RemoteReranker`]: a hosted reranking model over HTTP (`remote` feature)
//! - [`RerankerFactory`]: picks the provider from [`RerankConfig`], falling
//!   back to local when the remote one is misconfigured
//! - [`RetrievalRerankPipeline`]: retrieve → rerank → compose context, and
//!   degrade to the retrieval order when reranking fails
//! - [`SimilaritySearch`]: the first-stage search seam, with
//!   [`InMemoryVectorStore`] for tests and demos
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_rerank::{RerankConfig, RetrievalRerankPipeline};
//!
//! let pipeline = RetrievalRerankPipeline::builder()
//!     .config(RerankConfig::builder().final_top_k(3).build()?)
//!     .search(Arc::new(my_vector_store))
//!     .build()?;
//!
//! let outcome = pipeline.query("What is RAG?").await?;
//! println!("{}", outcome.context);
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `remote` (default) | [`RemoteReranker`] via `reqwest` |

pub mod bm25;
pub mod config;
pub mod document;
pub mod error;
pub mod factory;
pub mod freshness;
pub mod inmemory;
pub mod local;
pub mod pipeline;
pub mod quality;
pub mod reranker;
pub mod search;

#[cfg(feature = "remote")]
pub mod remote;

pub use config::{LexicalScoring, ProviderKind, RerankConfig, RerankConfigBuilder, ScoreWeights};
pub use document::{Document, RerankResult, ScoredDocument, SubScores};
pub use error::{RerankError, Result};
pub use factory::RerankerFactory;
pub use inmemory::InMemoryVectorStore;
pub use local::LocalReranker;
pub use pipeline::{
    RetrievalOutcome, RetrievalRerankPipeline, RetrievalRerankPipelineBuilder, compose_context,
};
pub use reranker::RerankingProvider;
pub use search::{EmbeddingProvider, SimilaritySearch};

#[cfg(feature = "remote")]
pub use remote::RemoteReranker;
