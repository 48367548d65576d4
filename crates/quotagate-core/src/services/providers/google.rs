//! Google Programmable Search (Custom Search JSON API)

use async_trait::async_trait;
use serde::Deserialize;

use super::adapter::{AdapterError, AdapterRequest, NormalizedResult, ProviderAdapter, SearchHit};
use super::http::{endpoint, send_for_body};
use crate::services::quota::Capability;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// The API rejects `num` above 10
const MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Search adapter for a Google Custom Search engine
pub struct GoogleCseAdapter {
    id: String,
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
    base_url: String,
}

impl GoogleCseAdapter {
    pub fn new(
        id: impl Into<String>,
        client: reqwest::Client,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderAdapter for GoogleCseAdapter {
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
        let num = (*max_results).clamp(1, MAX_RESULTS).to_string();

        log::debug!("[adapter:{}] search q={:?} num={}", self.id, query, num);

        let body = send_for_body(
            self.client
                .get(endpoint(&self.base_url, "/customsearch/v1"))
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("cx", self.engine_id.as_str()),
                    ("q", query.as_str()),
                    ("num", num.as_str()),
                ]),
        )
        .await?;

        let parsed: CseResponse = serde_json::from_str(&body)?;
        let hits = parsed
            .items
            .into_iter()
            .map(|item| SearchHit {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
            })
            .collect();

        Ok(NormalizedResult::Search(hits))
    }
}
