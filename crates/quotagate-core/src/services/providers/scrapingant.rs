//! ScrapingAnt general scraping endpoint

use async_trait::async_trait;
use serde::Deserialize;

use super::adapter::{AdapterError, AdapterRequest, NormalizedResult, ProviderAdapter};
use super::http::{endpoint, send_for_body};
use crate::services::quota::Capability;

pub const DEFAULT_BASE_URL: &str = "https://api.scrapingant.com";

#[derive(Debug, Deserialize)]
struct ScrapingAntResponse {
    html: Option<String>,
}

pub struct ScrapingAntAdapter {
    id: String,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ScrapingAntAdapter {
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
impl ProviderAdapter for ScrapingAntAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn capability(&self) -> Capability {
        Capability::Scrape
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<NormalizedResult, AdapterError> {
        let AdapterRequest::Scrape {
            url,
            render_js,
            premium_proxy,
        } = request
        else {
            return Err(AdapterError::Unsupported(format!("{} only serves scrape", self.id)));
        };

        log::debug!(
            "[adapter:{}] scrape url={} browser={} premium_proxy={}",
            self.id,
            url,
            render_js,
            premium_proxy
        );

        let mut params: Vec<(&str, &str)> = vec![("token", self.api_key.as_str()), ("url", url.as_str())];
        params.push(("browser", if *render_js { "true" } else { "false" }));
        if *premium_proxy {
            params.push(("proxy_type", "residential"));
        }

        let body = send_for_body(
            self.client
                .get(endpoint(&self.base_url, "/v2/general"))
                .query(&params),
        )
        .await?;

        let parsed: ScrapingAntResponse = serde_json::from_str(&body)?;
        let content = parsed
            .html
            .ok_or_else(|| AdapterError::Parse("response has no html field".to_string()))?;

        Ok(NormalizedResult::Scrape { content })
    }
}
