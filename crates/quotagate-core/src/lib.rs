//! # quotagate-core
//!
//! Quota-aware search/scrape dispatch - shared between the CLI and the HTTP server.
//!
//! This crate provides:
//! - Shared quota database (`db` module)
//! - Request/response models (`models` module)
//! - Quota store, provider adapters, dispatcher and telemetry (`services` module)
//! - HTTP routes (`api` module) and server assembly (`gateway` module)
//! - Configuration (`config` module)
//! - Unified error handling (`error` module)

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod services;

// Re-exports for convenience
pub use config::{GatewayConfig, ProviderConfig};
pub use db::Database;
pub use error::{Error, Result};

// Re-export commonly used types from services
pub use services::{
    AdapterError, AdapterKind, AdapterRequest, Attempt, AttemptOutcome, Capability, CostRule,
    DispatchError, DispatchOutcome, DispatchRequest, Dispatcher, EventRecorder, MemoryQuotaStore,
    NormalizedResult, ProviderAdapter, ProviderQuotaStatus, ProviderRegistry, ProviderSelection,
    ProviderSpec, QuotaRecord, QuotaStore, QuotaWindow, ResetCause, ResetTarget, SearchHit,
    SqliteQuotaStore, UsageEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
