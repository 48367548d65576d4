//! Gateway assembly
//!
//! Wires configuration, the shared quota database, the provider registry and
//! the dispatcher into an [`AppState`], then serves it over HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::api::{create_router, AppState};
use crate::config::GatewayConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::services::dispatch::{DispatchError, Dispatcher};
use crate::services::providers::{build_client, ProviderRegistry};
use crate::services::quota::{Capability, SqliteQuotaStore};
use crate::services::telemetry::EventRecorder;

/// Build the application state from a loaded configuration
pub async fn build_state(config: &GatewayConfig, db: &Database) -> Result<AppState> {
    let client = build_client(config.invoke_timeout())
        .map_err(|e| Error::internal(e.to_string()))?;
    let registry = ProviderRegistry::from_config(&config.providers, &client, config.is_from_file())?;
    if registry.is_empty() {
        log::warn!("[gateway] no providers registered; every request will be refused");
    }

    let longest_chain = [Capability::Search, Capability::Scrape]
        .iter()
        .map(|c| registry.candidates(*c).len())
        .max()
        .unwrap_or(0);

    let events = Arc::new(EventRecorder::new(config.event_buffer_capacity));
    let store = Arc::new(SqliteQuotaStore::new(db.pool.clone()).with_telemetry(events.clone()));

    let mut dispatcher = Dispatcher::new(Arc::new(registry), store, events.clone())
        .with_invoke_timeout(config.invoke_timeout())
        .with_attempt_capacity(config.event_buffer_capacity);
    if config.search_cache_ttl_secs > 0 {
        dispatcher = dispatcher.with_search_cache(config.search_cache_ttl());
    }
    dispatcher.initialize().await.map_err(|e| match e {
        DispatchError::Store { source, .. } => source,
        other => Error::internal(other.to_string()),
    })?;

    let request_timeout = request_timeout(config.invoke_timeout(), longest_chain);
    Ok(AppState::new(Arc::new(dispatcher), events).with_request_timeout(request_timeout))
}

/// Outer HTTP deadline: every provider of a capability may be tried once
fn request_timeout(invoke: Duration, chain: usize) -> Duration {
    let chain = u32::try_from(chain.max(1)).unwrap_or(u32::MAX);
    invoke
        .saturating_mul(chain)
        .saturating_add(Duration::from_secs(5))
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    let addr = listener.local_addr()?;
    log::info!("[gateway] listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("[gateway] shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::services::providers::{AdapterKind, CostRule};
    use crate::services::quota::QuotaWindow;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_state_with_no_credentials() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("q.db")).await.unwrap();
        let config = GatewayConfig {
            providers: vec![ProviderConfig {
                name: "brave".to_string(),
                kind: AdapterKind::Brave,
                capability: Capability::Search,
                priority: 1,
                limit: 10,
                window: QuotaWindow::Day,
                cost: CostRule::Flat(1),
                credential_env: "QUOTAGATE_TEST_UNSET_BRAVE_KEY".to_string(),
                engine_id_env: None,
                base_url: None,
            }],
            ..GatewayConfig::default()
        };

        // built-in source: missing credential skips the provider
        let state = build_state(&config, &db).await.unwrap();
        assert!(state.dispatcher.registry().is_empty());
    }

    #[test]
    fn test_request_timeout_covers_chain() {
        assert_eq!(request_timeout(Duration::from_secs(30), 0), Duration::from_secs(35));
        assert_eq!(request_timeout(Duration::from_secs(30), 3), Duration::from_secs(95));
    }

    #[test]
    fn test_request_timeout_saturates() {
        assert_eq!(request_timeout(Duration::MAX, 4), Duration::MAX);
        assert_eq!(request_timeout(Duration::from_secs(u64::MAX / 2), 3), Duration::MAX);
    }
}
