//! Serper.dev Google search API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::adapter::{AdapterError, AdapterRequest, NormalizedResult, ProviderAdapter, SearchHit};
use super::http::{endpoint, send_for_body};
use crate::services::quota::Capability;

pub const DEFAULT_BASE_URL: &str = "https://google.serper.dev";

const MAX_RESULTS: usize = 100;

#[derive(Debug, Serialize)]
struct SerperQuery<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

pub struct SerperAdapter {
    id: String,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SerperAdapter {
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
impl ProviderAdapter for SerperAdapter {
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
        let payload = SerperQuery {
            q: query,
            num: (*max_results).clamp(1, MAX_RESULTS),
        };

        log::debug!("[adapter:{}] search q={:?} num={}", self.id, query, payload.num);

        let body = send_for_body(
            self.client
                .post(endpoint(&self.base_url, "/search"))
                .header("X-API-KEY", &self.api_key)
                .json(&payload),
        )
        .await?;

        let parsed: SerperResponse = serde_json::from_str(&body)?;
        let mut hits: Vec<SearchHit> = parsed
            .organic
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
            })
            .collect();
        hits.truncate(payload.num);

        Ok(NormalizedResult::Search(hits))
    }
}
