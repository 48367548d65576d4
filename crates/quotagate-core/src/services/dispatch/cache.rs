//! Search result cache
//!
//! Keyed by the normalised query, the requested result count and the provider
//! selection. Entries expire after a fixed TTL; cached hits cost no credits.

use std::time::Duration;

use moka::future::Cache;

use super::types::ProviderSelection;
use crate::services::providers::SearchHit;

const MAX_CACHE_ENTRIES: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    max_results: usize,
    selection: String,
}

impl CacheKey {
    /// Lowercase the query and collapse runs of whitespace
    pub fn new(query: &str, max_results: usize, selection: &ProviderSelection) -> Self {
        let query = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self {
            query,
            max_results,
            selection: selection.to_string(),
        }
    }
}

/// Provider that produced the hits, plus the hits
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSearch {
    pub provider: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Clone)]
pub struct SearchCache {
    inner: Cache<CacheKey, CachedSearch>,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedSearch> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, value: CachedSearch) {
        self.inner.insert(key, value).await;
    }
}
