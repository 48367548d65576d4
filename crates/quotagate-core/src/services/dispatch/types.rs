//! Dispatch request, attempt and error types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::providers::{AdapterRequest, NormalizedResult, ProviderSpec};
use crate::services::quota::{Capability, QuotaRecord};

// ============================================================================
// Request
// ============================================================================

/// Which provider(s) a request may use
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderSelection {
    /// Walk the capability's providers in priority order with failover
    Auto,
    /// Use exactly this provider, never substitute
    Named(String),
}

impl ProviderSelection {
    /// `None`, empty or "auto" (any case) select automatic mode
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None => ProviderSelection::Auto,
            Some(v) if v.is_empty() || v.eq_ignore_ascii_case("auto") => ProviderSelection::Auto,
            Some(v) => ProviderSelection::Named(v.to_string()),
        }
    }
}

impl std::fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderSelection::Auto => write!(f, "auto"),
            ProviderSelection::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A capability request entering the dispatcher
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub payload: AdapterRequest,
    pub selection: ProviderSelection,
    /// Bypass the search result cache
    pub skip_cache: bool,
}

impl DispatchRequest {
    pub fn search(query: impl Into<String>, max_results: usize, selection: ProviderSelection) -> Self {
        Self {
            payload: AdapterRequest::Search {
                query: query.into(),
                max_results,
            },
            selection,
            skip_cache: false,
        }
    }

    pub fn scrape(
        url: impl Into<String>,
        render_js: bool,
        premium_proxy: bool,
        selection: ProviderSelection,
    ) -> Self {
        Self {
            payload: AdapterRequest::Scrape {
                url: url.into(),
                render_js,
                premium_proxy,
            },
            selection,
            skip_cache: false,
        }
    }

    pub fn with_skip_cache(mut self, skip_cache: bool) -> Self {
        self.skip_cache = skip_cache;
        self
    }

    pub fn capability(&self) -> Capability {
        self.payload.capability()
    }
}

// ============================================================================
// Attempts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransportError,
    CapacityDenied,
}

/// One provider tried while serving a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Quota Status
// ============================================================================

/// Per-provider quota view for status reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuotaStatus {
    pub provider: String,
    pub capability: Capability,
    pub priority: u32,
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
    pub active: bool,
    pub reset_at: DateTime<Utc>,
    pub utilization_pct: f64,
}

impl ProviderQuotaStatus {
    pub fn new(spec: &ProviderSpec, record: &QuotaRecord) -> Self {
        Self {
            provider: spec.name.clone(),
            capability: spec.capability,
            priority: spec.priority,
            used: record.used(),
            limit: record.limit,
            remaining: record.remaining,
            active: record.is_active(),
            reset_at: record.reset_at,
            utilization_pct: record.utilization_pct(),
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Successful dispatch
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub provider: String,
    pub result: NormalizedResult,
    pub credits_used: i64,
    pub remaining_quota: i64,
    pub cached: bool,
    pub attempts: Vec<Attempt>,
}

/// Why a dispatch did not produce a result
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Malformed request, never retried
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Named provider is not registered
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Every eligible provider is out of credits
    #[error("All {capability} providers exhausted")]
    Capacity {
        capability: Capability,
        checked: Vec<String>,
        attempts: Vec<Attempt>,
    },

    /// Provider call(s) failed
    #[error("{message}")]
    Transport {
        message: String,
        attempts: Vec<Attempt>,
    },

    /// Quota store failed, possibly after some providers were already tried
    #[error("{source}")]
    Store {
        #[source]
        source: crate::error::Error,
        attempts: Vec<Attempt>,
    },
}

impl From<crate::error::Error> for DispatchError {
    fn from(source: crate::error::Error) -> Self {
        DispatchError::Store {
            source,
            attempts: Vec::new(),
        }
    }
}

impl DispatchError {
    /// Attempts made before the failure, if any
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            DispatchError::Capacity { attempts, .. }
            | DispatchError::Transport { attempts, .. }
            | DispatchError::Store { attempts, .. } => attempts,
            _ => &[],
        }
    }
}
