//! Dispatcher
//!
//! Drives one request through SELECT → CONSUME → INVOKE:
//!
//! - SELECT picks the next candidate not yet attempted. In auto mode a
//!   candidate is eligible while its remaining quota is positive; a pass that
//!   finds nobody eligible is followed by one more pass before giving up.
//! - CONSUME debits the provider's credit cost in one atomic store call. A
//!   refused debit excludes the provider and returns to SELECT.
//! - INVOKE calls the adapter under a deadline. Failures are recorded and
//!   either surfaced (named provider) or answered with the next candidate.
//!
//! Credits consumed by a failed or timed-out invocation are not refunded.
//! A quota store failure ends the request but keeps the attempts made so far.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::cache::{CacheKey, CachedSearch, SearchCache};
use super::types::{
    Attempt, AttemptOutcome, DispatchError, DispatchOutcome, DispatchRequest, ProviderQuotaStatus,
    ProviderSelection,
};
use crate::config::{DEFAULT_EVENT_BUFFER_CAPACITY, DEFAULT_INVOKE_TIMEOUT_SECS};
use crate::services::providers::{
    AdapterError, AdapterRequest, NormalizedResult, ProviderRegistry, RegisteredProvider,
};
use crate::services::quota::{Capability, ConsumeOutcome, QuotaRecord, QuotaStore, ResetTarget};
use crate::services::telemetry::{BoundedBuffer, ResetCause, TelemetrySink, UsageEvent};

/// Upper bound on `max_results` accepted from callers
pub const MAX_RESULTS_LIMIT: usize = 100;

/// Quota-aware request dispatcher
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn QuotaStore>,
    telemetry: Arc<dyn TelemetrySink>,
    attempts: BoundedBuffer<Attempt>,
    cache: Option<SearchCache>,
    invoke_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn QuotaStore>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            registry,
            store,
            telemetry,
            attempts: BoundedBuffer::new(DEFAULT_EVENT_BUFFER_CAPACITY),
            cache: None,
            invoke_timeout: Duration::from_secs(DEFAULT_INVOKE_TIMEOUT_SECS),
        }
    }

    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Enable the search result cache
    pub fn with_search_cache(mut self, ttl: Duration) -> Self {
        self.cache = Some(SearchCache::new(ttl));
        self
    }

    pub fn with_attempt_capacity(mut self, capacity: usize) -> Self {
        self.attempts = BoundedBuffer::new(capacity);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Create quota records for every registered provider (idempotent)
    pub async fn initialize(&self) -> Result<(), DispatchError> {
        for provider in self.registry.all() {
            self.store
                .initialize(&provider.spec.name, provider.spec.limit, provider.spec.window)
                .await?;
        }
        Ok(())
    }

    /// Serve one capability request
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        let DispatchRequest {
            payload,
            selection,
            skip_cache,
        } = request;
        let payload = validate(payload)?;
        let capability = payload.capability();

        let cache_key = match (&payload, &self.cache) {
            (AdapterRequest::Search { query, max_results }, Some(_)) => {
                Some(CacheKey::new(query, *max_results, &selection))
            }
            _ => None,
        };

        if let (Some(key), Some(cache), false) = (&cache_key, &self.cache, skip_cache) {
            if let Some(hit) = cache.get(key).await {
                let remaining_quota = self.store.get_remaining(&hit.provider).await?;
                log::debug!("[dispatch] search cache hit ({})", hit.provider);
                return Ok(DispatchOutcome {
                    provider: hit.provider,
                    result: NormalizedResult::Search(hit.hits),
                    credits_used: 0,
                    remaining_quota,
                    cached: true,
                    attempts: Vec::new(),
                });
            }
        }

        let outcome = match &selection {
            ProviderSelection::Named(name) => {
                let provider = self
                    .registry
                    .get(name)
                    .ok_or_else(|| DispatchError::UnknownProvider(name.clone()))?;
                if provider.spec.capability != capability {
                    return Err(DispatchError::Validation(format!(
                        "provider {} does not serve {}",
                        name, capability
                    )));
                }
                self.dispatch_named(provider, &payload).await?
            }
            ProviderSelection::Auto => self.dispatch_auto(capability, &payload).await?,
        };

        if let (Some(key), Some(cache), NormalizedResult::Search(hits)) =
            (cache_key, &self.cache, &outcome.result)
        {
            cache
                .insert(
                    key,
                    CachedSearch {
                        provider: outcome.provider.clone(),
                        hits: hits.clone(),
                    },
                )
                .await;
        }

        Ok(outcome)
    }

    /// Explicit provider: one consume, one invoke, no substitution
    async fn dispatch_named(
        &self,
        provider: &RegisteredProvider,
        payload: &AdapterRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let name = provider.spec.name.clone();
        let credits = provider.spec.cost.credits_for(payload);
        let mut attempts = Vec::new();

        let started = Instant::now();
        let consumed = self.consume(&name, credits).await?;
        if !consumed.allowed {
            attempts.push(self.record_attempt(
                &name,
                AttemptOutcome::CapacityDenied,
                Some(format!("{} credits required", credits)),
                started,
            ));
            return Err(DispatchError::Capacity {
                capability: provider.spec.capability,
                checked: vec![name],
                attempts,
            });
        }

        let started = Instant::now();
        match self.invoke(provider, payload).await {
            Ok(result) => {
                attempts.push(self.record_attempt(&name, AttemptOutcome::Success, None, started));
                Ok(self.success(name, result, credits, consumed, attempts))
            }
            Err(err) => {
                log::warn!("[dispatch] {} failed: {}", name, err);
                attempts.push(self.record_attempt(
                    &name,
                    AttemptOutcome::TransportError,
                    Some(err.to_string()),
                    started,
                ));
                Err(DispatchError::Transport {
                    message: format!("Provider {} failed: {}", name, err),
                    attempts,
                })
            }
        }
    }

    /// Automatic mode: priority order with failover
    async fn dispatch_auto(
        &self,
        capability: Capability,
        payload: &AdapterRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let candidates = self.registry.candidates(capability);
        let mut attempted: HashSet<String> = HashSet::new();
        let mut checked: Vec<String> = Vec::new();
        let mut attempts: Vec<Attempt> = Vec::new();

        for pass in 0..2 {
            let mut found_eligible = false;

            for provider in &candidates {
                let name = &provider.spec.name;
                if attempted.contains(name) {
                    continue;
                }

                let remaining = match self.store.get_remaining(name).await {
                    Ok(remaining) => remaining,
                    Err(source) => return Err(DispatchError::Store { source, attempts }),
                };
                if !checked.contains(name) {
                    checked.push(name.clone());
                }
                if remaining <= 0 {
                    log::debug!("[dispatch] {} exhausted, skipping", name);
                    continue;
                }

                found_eligible = true;
                attempted.insert(name.clone());

                let credits = provider.spec.cost.credits_for(payload);
                let started = Instant::now();
                let consumed = match self.consume(name, credits).await {
                    Ok(consumed) => consumed,
                    Err(source) => return Err(DispatchError::Store { source, attempts }),
                };
                if !consumed.allowed {
                    attempts.push(self.record_attempt(
                        name,
                        AttemptOutcome::CapacityDenied,
                        Some(format!("{} credits required, {} remaining", credits, remaining)),
                        started,
                    ));
                    continue;
                }

                let started = Instant::now();
                match self.invoke(provider, payload).await {
                    Ok(result) => {
                        attempts.push(self.record_attempt(name, AttemptOutcome::Success, None, started));
                        return Ok(self.success(name.clone(), result, credits, consumed, attempts));
                    }
                    Err(err) => {
                        log::warn!("[dispatch] {} failed, trying next provider: {}", name, err);
                        attempts.push(self.record_attempt(
                            name,
                            AttemptOutcome::TransportError,
                            Some(err.to_string()),
                            started,
                        ));
                    }
                }
            }

            if found_eligible {
                break;
            }
            if pass == 0 {
                log::debug!("[dispatch] no eligible {} provider, checking once more", capability);
            }
        }

        let transport_failures = attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::TransportError)
            .count();

        if transport_failures > 0 {
            log::error!(
                "[dispatch] every {} provider failed ({} attempt(s))",
                capability,
                attempts.len()
            );
            return Err(DispatchError::Transport {
                message: format!("All {} providers failed", capability),
                attempts,
            });
        }

        log::warn!(
            "[dispatch] all {} providers exhausted (checked: {})",
            capability,
            checked.join(", ")
        );
        Err(DispatchError::Capacity {
            capability,
            checked,
            attempts,
        })
    }

    /// Atomic debit plus usage telemetry
    async fn consume(&self, provider: &str, credits: i64) -> crate::error::Result<ConsumeOutcome> {
        let outcome = self.store.try_consume(provider, credits).await?;
        let now = Utc::now();

        self.telemetry.record(UsageEvent::QuotaUsage {
            provider: provider.to_string(),
            credits,
            allowed: outcome.allowed,
            remaining: outcome.remaining,
            timestamp: now,
        });
        if outcome.deactivated() {
            self.telemetry.record(UsageEvent::ProviderDeactivation {
                provider: provider.to_string(),
                timestamp: now,
            });
        }

        Ok(outcome)
    }

    async fn invoke(
        &self,
        provider: &RegisteredProvider,
        payload: &AdapterRequest,
    ) -> Result<NormalizedResult, AdapterError> {
        let payload = match payload {
            AdapterRequest::Search { query, max_results } => AdapterRequest::Search {
                query: query.clone(),
                max_results: (*max_results).min(provider.adapter.max_results_cap()),
            },
            other => other.clone(),
        };

        match tokio::time::timeout(self.invoke_timeout, provider.adapter.execute(&payload)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(self.invoke_timeout.as_millis() as u64)),
        }
    }

    fn record_attempt(
        &self,
        provider: &str,
        outcome: AttemptOutcome,
        detail: Option<String>,
        started: Instant,
    ) -> Attempt {
        let attempt = Attempt {
            provider: provider.to_string(),
            outcome,
            detail,
            latency_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        };
        self.attempts.push(attempt.clone());
        attempt
    }

    fn success(
        &self,
        provider: String,
        result: NormalizedResult,
        credits: i64,
        consumed: ConsumeOutcome,
        attempts: Vec<Attempt>,
    ) -> DispatchOutcome {
        log::info!(
            "[dispatch] served by {} ({} credit(s), {} remaining, {} attempt(s))",
            provider,
            credits,
            consumed.remaining,
            attempts.len()
        );
        DispatchOutcome {
            provider,
            result,
            credits_used: credits,
            remaining_quota: consumed.remaining,
            cached: false,
            attempts,
        }
    }

    /// Quota view of every registered provider
    pub async fn quota_status(&self) -> Result<Vec<ProviderQuotaStatus>, DispatchError> {
        let mut statuses = Vec::new();
        for provider in self.registry.all() {
            let record = self.store.record(&provider.spec.name).await?;
            statuses.push(ProviderQuotaStatus::new(&provider.spec, &record));
        }
        Ok(statuses)
    }

    /// Refill one provider or all of them
    pub async fn reset_quotas(&self, target: &ResetTarget) -> Result<Vec<QuotaRecord>, DispatchError> {
        if let ResetTarget::Provider(name) = target {
            if self.registry.get(name).is_none() {
                return Err(DispatchError::UnknownProvider(name.clone()));
            }
        }

        let records = self.store.reset(target).await?;
        let now = Utc::now();
        for record in &records {
            self.telemetry.record(UsageEvent::QuotaReset {
                provider: record.provider.clone(),
                cause: ResetCause::Manual,
                remaining: record.remaining,
                reset_at: record.reset_at,
                timestamp: now,
            });
        }
        Ok(records)
    }

    /// Drain the attempt log
    pub fn drain_attempts(&self) -> Vec<Attempt> {
        self.attempts.drain()
    }
}

/// Reject malformed payloads and trim text fields
fn validate(payload: AdapterRequest) -> Result<AdapterRequest, DispatchError> {
    match payload {
        AdapterRequest::Search { query, max_results } => {
            let query = query.trim().to_string();
            if query.is_empty() {
                return Err(DispatchError::Validation("query is required".to_string()));
            }
            if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
                return Err(DispatchError::Validation(format!(
                    "max_results must be between 1 and {}",
                    MAX_RESULTS_LIMIT
                )));
            }
            Ok(AdapterRequest::Search { query, max_results })
        }
        AdapterRequest::Scrape {
            url,
            render_js,
            premium_proxy,
        } => {
            let url = url.trim().to_string();
            if url.is_empty() {
                return Err(DispatchError::Validation("url is required".to_string()));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DispatchError::Validation(format!(
                    "url must start with http:// or https:// (got {})",
                    url
                )));
            }
            Ok(AdapterRequest::Scrape {
                url,
                render_js,
                premium_proxy,
            })
        }
    }
}
