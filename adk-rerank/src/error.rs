//! Error types for the `adk-rerank` crate.

use thiserror::Error;

/// Errors that can occur while retrieving and reranking documents.
#[derive(Debug, Error)]
pub enum RerankError {
    /// The coarse retrieval stage failed or timed out. Always fatal for a query.
    #[error("Retrieval error ({backend}): {message}")]
    Retrieval {
        /// The search backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The remote reranker could not be reached or returned a failure status.
    #[error("Rerank transport error ({provider}): {message}")]
    RerankTransport {
        /// The reranking provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The remote reranker answered with a body that could not be mapped back
    /// onto the input documents.
    #[error("Malformed rerank response ({provider}): {message}")]
    MalformedResponse {
        /// The reranking provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RerankError {
    /// Whether the pipeline may recover from this error by falling back to
    /// the coarse retrieval order.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RerankTransport { .. } | Self::MalformedResponse { .. })
    }
}

/// A convenience result type for rerank operations.
pub type Result<T> = std::result::Result<T, RerankError>;
