//! Startup-time selection of the reranking provider.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ProviderKind, RerankConfig};
use crate::local::LocalReranker;
use crate::reranker::RerankingProvider;

/// Builds the [`RerankingProvider`] named by a [`RerankConfig`].
///
/// Selection happens once, when the pipeline is assembled. A remote provider
/// that cannot work with the given configuration (missing API key, bad
/// endpoint, or the `remote` feature compiled out) is replaced by a
/// [`LocalReranker`] and a warning is logged. Invalid local weights are
/// replaced by [`ScoreWeights::default()`](crate::ScoreWeights) the same way;
/// startup never fails here.
///
/// This is a configuration-time decision only. Per-request transport
/// failures are handled by [`RetrievalRerankPipeline`](crate::RetrievalRerankPipeline).
#[derive(Debug, Clone, Copy, Default)]
pub struct RerankerFactory;

impl RerankerFactory {
    /// Create the provider for `config`.
    pub fn create(config: &RerankConfig) -> Arc<dyn RerankingProvider> {
        match config.provider {
            ProviderKind::Local => {
                info!(provider = %config.provider, "using local reranker");
                Self::create_local(config)
            }
            ProviderKind::Remote => Self::create_remote(config),
        }
    }

    #[cfg(feature = "remote")]
    fn create_remote(config: &RerankConfig) -> Arc<dyn RerankingProvider> {
        use crate::remote::RemoteReranker;

        let has_key = config.remote_api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if !has_key {
            warn!("remote reranker requested but no API key is configured, using local reranker");
            return Self::create_local(config);
        }

        let remote = RemoteReranker::from_config(config);
        if !remote.is_available() {
            warn!(
                endpoint = %config.remote_endpoint,
                "remote reranker is not available, using local reranker"
            );
            return Self::create_local(config);
        }

        info!(
            model = %config.remote_model,
            endpoint = %config.remote_endpoint,
            "using remote reranker"
        );
        Arc::new(remote)
    }

    #[cfg(not(feature = "remote"))]
    fn create_remote(config: &RerankConfig) -> Arc<dyn RerankingProvider> {
        warn!("remote reranker requested without the `remote` feature, using local reranker");
        Self::create_local(config)
    }

    fn create_local(config: &RerankConfig) -> Arc<dyn RerankingProvider> {
        let reranker = LocalReranker::from_config(config).unwrap_or_else(|e| {
            warn!(error = %e, weights = ?config.weights, "invalid rerank weights, using defaults");
            LocalReranker::default().with_lexical(config.lexical)
        });
        Arc::new(reranker)
    }
}
