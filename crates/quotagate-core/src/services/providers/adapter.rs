//! Provider adapter trait and error types
//!
//! Defines the interface every external search/scrape provider implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::quota::Capability;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when calling a provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// Credentials rejected by the provider
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Provider reports its own quota or rate limit as exceeded (HTTP 429/402)
    #[error("Provider quota exceeded: {0}")]
    RateLimited(String),

    /// Provider returned a non-success status
    #[error("API error: {0}")]
    Api(String),

    /// Response body could not be mapped to the normalized shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Network request failed
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the invocation deadline (milliseconds)
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Adapter was handed a request for the other capability
    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            AdapterError::Network("Connection failed".to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else if err.is_status() {
            match err.status() {
                Some(status) => AdapterError::from_status(status.as_u16(), ""),
                None => AdapterError::Network(err.to_string()),
            }
        } else {
            AdapterError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

impl AdapterError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate(body.trim(), 200))
        };

        match status {
            401 | 403 => AdapterError::Unauthorized(detail),
            402 | 429 => AdapterError::RateLimited(detail),
            _ => AdapterError::Api(detail),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// Request / Result Shapes
// ============================================================================

/// Normalized request handed to an adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AdapterRequest {
    Search {
        query: String,
        max_results: usize,
    },
    Scrape {
        url: String,
        render_js: bool,
        premium_proxy: bool,
    },
}

impl AdapterRequest {
    pub fn capability(&self) -> Capability {
        match self {
            AdapterRequest::Search { .. } => Capability::Search,
            AdapterRequest::Scrape { .. } => Capability::Scrape,
        }
    }
}

/// One search hit in the shared shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Provider output mapped into the shared shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedResult {
    Search(Vec<SearchHit>),
    Scrape { content: String },
}

// ============================================================================
// Adapter Trait
// ============================================================================

/// Trait for external provider adapters
///
/// Each adapter owns:
/// 1. Endpoint construction and credential injection
/// 2. The HTTP call itself
/// 3. Mapping the provider-specific response into [`NormalizedResult`]
///
/// Adapters never touch quota; the dispatcher debits credits before calling
/// [`ProviderAdapter::execute`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider identity, matching the registry entry (e.g. "brave")
    fn provider_id(&self) -> &str;

    /// Capability this adapter serves
    fn capability(&self) -> Capability;

    /// Largest result count the provider accepts per call
    fn max_results_cap(&self) -> usize {
        10
    }

    /// Perform the call and normalize its response
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` for network failures, non-success statuses and
    /// payloads that cannot be mapped.
    async fn execute(&self, request: &AdapterRequest) -> Result<NormalizedResult, AdapterError>;
}
