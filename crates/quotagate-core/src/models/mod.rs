//! Data models - request and response bodies of the HTTP surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::dispatch::{Attempt, ProviderQuotaStatus};
use crate::services::providers::SearchHit;
use crate::services::telemetry::UsageEvent;

pub const DEFAULT_MAX_RESULTS: usize = 10;

// ============================================================================
// Requests
// ============================================================================

/// `POST /api/search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchBody {
    pub query: Option<String>,
    pub max_results: Option<usize>,
    /// Provider name or "auto"
    pub provider: Option<String>,
    #[serde(default)]
    pub skip_cache: bool,
}

/// `POST /api/scrape`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeBody {
    pub url: Option<String>,
    #[serde(default)]
    pub render_js: bool,
    #[serde(default)]
    pub use_premium_proxy: bool,
    pub provider: Option<String>,
}

/// `POST /api/reset-quotas`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetBody {
    /// Provider name or "all"; absent means all
    pub provider: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub provider: String,
    pub query: String,
    pub results: Vec<SearchHit>,
    pub results_count: usize,
    pub execution_time_ms: u64,
    pub remaining_quota: i64,
    pub cached: bool,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub provider: String,
    pub url: String,
    pub content: String,
    pub credits_used: i64,
    pub execution_time_ms: u64,
    pub remaining_quota: i64,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStatusResponse {
    pub success: bool,
    pub quotas: Vec<ProviderQuotaStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub success: bool,
    pub count: usize,
    pub events: Vec<UsageEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptsResponse {
    pub success: bool,
    pub count: usize,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Vec<Attempt>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            checked: None,
            attempts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_defaults() {
        let body: SearchBody = serde_json::from_str(r#"{"query": "rust"}"#).unwrap();
        assert_eq!(body.query.as_deref(), Some("rust"));
        assert!(body.max_results.is_none());
        assert!(body.provider.is_none());
        assert!(!body.skip_cache);
    }

    #[test]
    fn test_scrape_body_flags() {
        let body: ScrapeBody = serde_json::from_str(
            r#"{"url": "https://example.com", "render_js": true, "use_premium_proxy": true}"#,
        )
        .unwrap();
        assert!(body.render_js);
        assert!(body.use_premium_proxy);
    }

    #[test]
    fn test_error_response_omits_empty_lists() {
        let json = serde_json::to_value(ErrorResponse::new("bad")).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("checked").is_none());
        assert!(json.get("attempts").is_none());
    }
}
