//! Provider selection and the remote-to-fallback path end to end.

use std::sync::Arc;

use adk_rerank::config::{ProviderKind, RerankConfig};
use adk_rerank::document::Document;
use adk_rerank::error::Result;
use adk_rerank::factory::RerankerFactory;
use adk_rerank::pipeline::{FALLBACK_PROVIDER_NAME, RetrievalRerankPipeline};
use adk_rerank::search::SimilaritySearch;
use async_trait::async_trait;

fn remote_config() -> adk_rerank::config::RerankConfigBuilder {
    RerankConfig::builder().provider(ProviderKind::Remote)
}

#[test]
fn local_config_builds_local_provider() {
    let provider = RerankerFactory::create(&RerankConfig::default());
    assert_eq!(provider.provider_name(), "local");
    assert!(provider.is_available());
}

#[test]
fn remote_without_api_key_falls_back_to_local() {
    let provider = RerankerFactory::create(&remote_config().build().unwrap());
    assert_eq!(provider.provider_name(), "local");

    let blank = remote_config().remote_api_key("   ").build().unwrap();
    assert_eq!(RerankerFactory::create(&blank).provider_name(), "local");
}

#[cfg(feature = "remote")]
#[test]
fn remote_with_api_key_builds_remote_provider() {
    let config = remote_config().remote_api_key("sk-test").build().unwrap();
    let provider = RerankerFactory::create(&config);
    assert_eq!(provider.provider_name(), "remote");
    assert!(provider.is_available());
}

#[cfg(feature = "remote")]
#[test]
fn remote_with_unusable_endpoint_falls_back_to_local() {
    let config = remote_config()
        .remote_api_key("sk-test")
        .remote_endpoint("not a url")
        .build()
        .unwrap();
    assert_eq!(RerankerFactory::create(&config).provider_name(), "local");
}

#[test]
fn env_lookup_drives_selection() {
    let vars = [("RERANK_PROVIDER", "remote"), ("RERANK_FINAL_TOP_K", "3")];
    let config = RerankConfig::from_lookup(|key| {
        vars.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_string())
    })
    .unwrap();

    assert_eq!(config.provider, ProviderKind::Remote);
    assert_eq!(config.final_top_k, 3);
    assert_eq!(RerankerFactory::create(&config).provider_name(), "local");
}

#[tokio::test]
async fn deserialized_weights_are_validated_before_scoring() {
    let documents = vec![Document::new("alpha beta").with_metadata("distance", 0.0)];

    let unnormalized: RerankConfig = serde_json::from_value(serde_json::json!({
        "weights": { "semantic": 1.0, "lexical": 1.0, "quality": 1.0, "freshness": 1.0 }
    }))
    .unwrap();
    let provider = RerankerFactory::create(&unnormalized);
    let results = provider.rerank("alpha", &documents, 1).await.unwrap();
    assert_eq!(provider.provider_name(), "local");
    assert!(
        (0.0..=1.0).contains(&results[0].relevance_score),
        "score {} outside [0, 1]",
        results[0].relevance_score
    );

    let negative: RerankConfig = serde_json::from_value(serde_json::json!({
        "weights": { "semantic": -1.0, "lexical": 0.0, "quality": 0.0, "freshness": 0.0 }
    }))
    .unwrap();
    let provider = RerankerFactory::create(&negative);
    let results = provider.rerank("alpha", &documents, 1).await.unwrap();
    assert_eq!(provider.provider_name(), "local");
    assert!(
        (0.0..=1.0).contains(&results[0].relevance_score),
        "score {} outside [0, 1]",
        results[0].relevance_score
    );
}

struct FixedSearch(Vec<Document>);

#[async_trait]
impl SimilaritySearch for FixedSearch {
    async fn similarity_search(&self, _query: &str, top_k: usize) -> Result<Vec<Document>> {
        Ok(self.0.iter().take(top_k).cloned().collect())
    }
}

#[cfg(feature = "remote")]
#[tokio::test]
async fn remote_server_error_degrades_pipeline() {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let config = remote_config()
        .remote_api_key("sk-test")
        .remote_endpoint(format!("{}/v1/rerank", server.uri()))
        .remote_max_retries(0)
        .final_top_k(2)
        .build()
        .unwrap();
    let documents: Vec<Document> =
        ["first", "second", "third"].into_iter().map(Document::new).collect();
    let pipeline = RetrievalRerankPipeline::builder()
        .config(config)
        .search(Arc::new(FixedSearch(documents)))
        .build()
        .unwrap();
    assert_eq!(pipeline.reranker().provider_name(), "remote");

    let outcome = pipeline.query("anything").await.unwrap();

    assert!(outcome.degraded);
    let texts: Vec<&str> = outcome.results.iter().map(|r| r.document.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert!(outcome.results.iter().all(|r| r.provider_name == FALLBACK_PROVIDER_NAME));
    assert_eq!(outcome.context, "first\nsecond");
}
