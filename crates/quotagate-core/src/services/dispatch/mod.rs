//! Quota-aware dispatch
//!
//! Routes search and scrape requests to providers in priority order, debiting
//! each provider's shared quota before it is called and failing over when a
//! provider is exhausted or broken.

pub mod cache;
pub mod dispatcher;
pub mod types;

pub use cache::{CacheKey, CachedSearch, SearchCache};
pub use dispatcher::{Dispatcher, MAX_RESULTS_LIMIT};
pub use types::{
    Attempt, AttemptOutcome, DispatchError, DispatchOutcome, DispatchRequest, ProviderQuotaStatus,
    ProviderSelection,
};
