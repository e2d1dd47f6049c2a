//! Reranking through a remote HTTP API.
//!
//! This module is only available when the `remote` feature is enabled.
//!
//! Wire format (SiliconFlow / Jina style):
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer {api_key}
//! {"query": "...", "model": "...", "top_k": 5, "return_documents": true, "documents": ["..."]}
//!
//! 200 OK
//! {"object": "list", "model": "...", "usage": {"total_tokens": 42},
//!  "data": [{"index": 2, "relevance_score": 0.93, "document": "..."}]}
//! ```
//!
//! A `results` array is accepted in place of `data`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::RerankConfig;
use crate::document::{Document, RerankResult};
use crate::error::{RerankError, Result};
use crate::reranker::{RerankingProvider, rank_stable};

/// Provider name reported by [`RemoteReranker`].
pub const REMOTE_PROVIDER_NAME: &str = "remote";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A [`RerankingProvider`] backed by a hosted reranking model.
///
/// Failures are returned to the caller as
/// [`RerankError::RerankTransport`] or [`RerankError::MalformedResponse`];
/// this provider never falls back on its own.
///
/// Transport errors, `429` and `5xx` responses are retried up to
/// `max_retries` times with exponential backoff. Other statuses and
/// undecodable bodies fail immediately.
///
/// # Example
///
/// ```rust,ignore
/// use adk_rerank::RemoteReranker;
///
/// let reranker = RemoteReranker::new("sk-...")
///     .with_model("BAAI/bge-reranker-v2-m3")
///     .with_max_retries(1);
/// let results = reranker.rerank("query", &documents, 5).await?;
/// ```
#[derive(Clone)]
pub struct RemoteReranker {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl fmt::Debug for RemoteReranker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteReranker")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RemoteReranker {
    /// Create a reranker for the default endpoint and model.
    ///
    /// An empty key is accepted here; [`is_available`](RerankingProvider::is_available)
    /// reports it.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: crate::config::DEFAULT_REMOTE_ENDPOINT.to_string(),
            model: crate::config::DEFAULT_REMOTE_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Create a reranker from the `remote_*` fields of a configuration.
    pub fn from_config(config: &RerankConfig) -> Self {
        Self::new(config.remote_api_key.clone().unwrap_or_default())
            .with_endpoint(config.remote_endpoint.clone())
            .with_model(config.remote_model.clone())
            .with_timeout(config.remote_timeout)
            .with_max_retries(config.remote_max_retries)
    }

    /// Set the API endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many times a retryable failure is retried.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay before the first retry; it doubles on each further retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// The model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_with_retry(&self, request: &RerankRequest<'_>) -> Result<RerankResponse> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(Failure::Retryable(e)) if attempt < self.max_retries => {
                    let delay = self.retry_delay.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        provider = REMOTE_PROVIDER_NAME,
                        attempt,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %e,
                        "rerank request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Failure::Retryable(e) | Failure::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        request: &RerankRequest<'_>,
    ) -> std::result::Result<RerankResponse, Failure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = REMOTE_PROVIDER_NAME, error = %e, "request failed");
                Failure::Retryable(transport(format!("request failed: {e}")))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(provider = REMOTE_PROVIDER_NAME, error = %e, "failed to read response body");
            Failure::Retryable(transport(format!("failed to read response body: {e}")))
        })?;

        if !status.is_success() {
            error!(provider = REMOTE_PROVIDER_NAME, %status, "API error");
            let err = transport(format!("API returned {status}: {}", error_detail(&body)));
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                Failure::Retryable(err)
            } else {
                Failure::Fatal(err)
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(provider = REMOTE_PROVIDER_NAME, error = %e, "failed to parse response");
            Failure::Fatal(malformed(format!("failed to parse response: {e}")))
        })
    }

    fn map_response(
        &self,
        response: RerankResponse,
        documents: &[Document],
        top_k: usize,
    ) -> Result<Vec<RerankResult>> {
        debug!(
            provider = REMOTE_PROVIDER_NAME,
            object = response.object.as_deref().unwrap_or_default(),
            model = response.model.as_deref().unwrap_or(&self.model),
            total_tokens = response.usage.map(|u| u.total_tokens),
            items = response.data.len(),
            "rerank response received"
        );

        let mut seen = vec![false; documents.len()];
        let mut scored = Vec::with_capacity(response.data.len());
        for item in response.data {
            let Some(document) = documents.get(item.index) else {
                return Err(malformed(format!(
                    "index {} out of range for {} documents",
                    item.index,
                    documents.len()
                )));
            };
            if std::mem::replace(&mut seen[item.index], true) {
                return Err(malformed(format!("index {} returned more than once", item.index)));
            }
            if !item.relevance_score.is_finite() {
                return Err(malformed(format!("non-finite score for index {}", item.index)));
            }
            if let Some(Value::String(echo)) = &item.document {
                if echo != &document.text {
                    warn!(index = item.index, "echoed document text differs from input");
                }
            }
            scored.push((item.index, item.relevance_score));
        }

        if scored.len() < top_k {
            return Err(malformed(format!("expected {top_k} results, got {}", scored.len())));
        }

        Ok(rank_stable(documents, scored, top_k, REMOTE_PROVIDER_NAME))
    }
}

enum Failure {
    Retryable(RerankError),
    Fatal(RerankError),
}

fn transport(message: String) -> RerankError {
    RerankError::RerankTransport { provider: REMOTE_PROVIDER_NAME.to_string(), message }
}

fn malformed(message: String) -> RerankError {
    RerankError::MalformedResponse { provider: REMOTE_PROVIDER_NAME.to_string(), message }
}

/// Pull a human-readable message out of an error body, if there is one.
fn error_detail(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error").and_then(|e| e.get("message")))
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

// ── Rerank API request/response types ──────────────────────────────

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    model: &'a str,
    top_k: usize,
    return_documents: bool,
    documents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RerankResponse {
    #[serde(default)]
    object: Option<String>,
    #[serde(alias = "results")]
    data: Vec<RerankItem>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct RerankItem {
    index: usize,
    relevance_score: f32,
    /// Echoed text; some APIs send an object here instead of a string.
    #[serde(default)]
    document: Option<Value>,
}

#[derive(Deserialize, Clone, Copy)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

// ── RerankingProvider implementation ───────────────────────────────

#[async_trait]
impl RerankingProvider for RemoteReranker {
    fn provider_name(&self) -> &str {
        REMOTE_PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
            && reqwest::Url::parse(&self.endpoint)
                .is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
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
        let top_k = top_k.min(documents.len());

        debug!(
            provider = REMOTE_PROVIDER_NAME,
            model = %self.model,
            candidates = documents.len(),
            top_k,
            "sending rerank request"
        );

        let request = RerankRequest {
            query,
            model: &self.model,
            top_k,
            return_documents: true,
            documents: documents.iter().map(|d| d.text.as_str()).collect(),
        };

        let response = self.send_with_retry(&request).await?;
        self.map_response(response, documents, top_k)
    }
}
