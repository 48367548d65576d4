//! Brave Search API

use async_trait::async_trait;
use serde::Deserialize;

use super::adapter::{AdapterError, AdapterRequest, NormalizedResult, ProviderAdapter, SearchHit};
use super::http::{endpoint, send_for_body};
use crate::services::quota::Capability;

pub const DEFAULT_BASE_URL: &str = "https://api.search.brave.com";

const MAX_RESULTS: usize = 20;

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

pub struct BraveAdapter {
    id: String,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl BraveAdapter {
    pub fn new(id: impl Into<String>, client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderAdapter for BraveAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn capability(&self) -> Capability {
        Capability::Search
    }

    fn max_results_cap(&self) -> usize {
        MAX_RESULTS
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<NormalizedResult, AdapterError> {
        let AdapterRequest::Search { query, max_results } = request else {
            return Err(AdapterError::Unsupported(format!("{} only serves search", self.id)));
        };
        let count = (*max_results).clamp(1, MAX_RESULTS).to_string();

        log::debug!("[adapter:{}] search q={:?} count={}", self.id, query, count);

        let body = send_for_body(
            self.client
                .get(endpoint(&self.base_url, "/res/v1/web/search"))
                .header("X-Subscription-Token", &self.api_key)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&[("q", query.as_str()), ("count", count.as_str())]),
        )
        .await?;

        let parsed: BraveResponse = serde_json::from_str(&body)?;
        let hits = parsed
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.description,
            })
            .collect();

        Ok(NormalizedResult::Search(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base_url: String) -> BraveAdapter {
        BraveAdapter::new("brave", reqwest::Client::new(), "brave-token").with_base_url(base_url)
    }

    #[tokio::test]
    async fn test_maps_web_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/res/v1/web/search"))
            .and(header("X-Subscription-Token", "brave-token"))
            .and(query_param("q", "docker tutorial"))
            .and(query_param("count", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web": {"results": [
                    {"title": "Docker Docs", "url": "https://docs.docker.com", "description": "Get started"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = AdapterRequest::Search {
            query: "docker tutorial".to_string(),
            max_results: 25,
        };
        let result = adapter(server.uri()).execute(&request).await.unwrap();

        assert_eq!(
            result,
            NormalizedResult::Search(vec![SearchHit {
                title: "Docker Docs".to_string(),
                url: "https://docs.docker.com".to_string(),
                snippet: "Get started".to_string(),
            }])
        );
    }

    #[tokio::test]
    async fn test_missing_web_section() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "search"})))
            .mount(&server)
            .await;

        let request = AdapterRequest::Search {
            query: "q".to_string(),
            max_results: 5,
        };
        let result = adapter(server.uri()).execute(&request).await.unwrap();
        assert_eq!(result, NormalizedResult::Search(vec![]));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let request = AdapterRequest::Search {
            query: "q".to_string(),
            max_results: 5,
        };
        let err = adapter(server.uri()).execute(&request).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unauthorized(_)));
    }
}
