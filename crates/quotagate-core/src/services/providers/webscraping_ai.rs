//! WebScraping.AI HTML endpoint

use async_trait::async_trait;

use super::adapter::{AdapterError, AdapterRequest, NormalizedResult, ProviderAdapter};
use super::http::{endpoint, send_for_body};
use crate::services::quota::Capability;

pub const DEFAULT_BASE_URL: &str = "https://api.webscraping.ai";

pub struct WebScrapingAiAdapter {
    id: String,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl WebScrapingAiAdapter {
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
impl ProviderAdapter for WebScrapingAiAdapter {
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
            "[adapter:{}] scrape url={} js={} premium_proxy={}",
            self.id,
            url,
            render_js,
            premium_proxy
        );

        let mut params: Vec<(&str, &str)> = vec![("api_key", self.api_key.as_str()), ("url", url.as_str())];
        params.push(("js", if *render_js { "true" } else { "false" }));
        if *premium_proxy {
            params.push(("proxy", "residential"));
        }

        let content = send_for_body(
            self.client
                .get(endpoint(&self.base_url, "/html"))
                .query(&params),
        )
        .await?;

        Ok(NormalizedResult::Scrape { content })
    }
}
