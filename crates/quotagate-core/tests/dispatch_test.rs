//! Integration tests for the dispatcher against a shared SQLite quota database
//! and mocked provider HTTP APIs

use std::sync::Arc;
use std::time::Duration;

use quotagate_core::config::{default_providers, ProviderConfig};
use quotagate_core::db::Database;
use quotagate_core::services::dispatch::{
    AttemptOutcome, DispatchError, DispatchRequest, Dispatcher, ProviderSelection,
};
use quotagate_core::services::providers::{build_client, NormalizedResult, ProviderRegistry};
use quotagate_core::services::quota::{QuotaStore, ResetTarget, SqliteQuotaStore};
use quotagate_core::services::telemetry::{EventRecorder, UsageEvent};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("quota.db");
    let db = Database::open(db_path).await.expect("Failed to create test database");
    (db, temp_dir)
}

fn test_env(var: &str) -> Option<String> {
    Some(format!("test-{}", var.to_lowercase()))
}

/// Search providers from the default table, pointed at mock servers
fn search_providers(google_url: &str, brave_url: &str, google_limit: i64) -> Vec<ProviderConfig> {
    default_providers()
        .into_iter()
        .filter(|p| p.name == "google" || p.name == "brave")
        .map(|mut p| {
            if p.name == "google" {
                p.base_url = Some(google_url.to_string());
                p.limit = google_limit;
            } else {
                p.base_url = Some(brave_url.to_string());
            }
            p
        })
        .collect()
}

async fn dispatcher_for(
    db: &Database,
    providers: &[ProviderConfig],
) -> (Dispatcher, Arc<EventRecorder>) {
    let client = build_client(Duration::from_secs(5)).unwrap();
    let registry = ProviderRegistry::from_config_with(providers, &client, true, test_env).unwrap();
    let events = Arc::new(EventRecorder::default());
    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(SqliteQuotaStore::new(db.pool.clone())),
        events.clone(),
    )
    .with_invoke_timeout(Duration::from_secs(5));
    dispatcher.initialize().await.unwrap();
    (dispatcher, events)
}

async fn mount_brave_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/res/v1/web/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "web": {"results": [
                {"title": "Docker", "url": "https://docs.docker.com", "description": "Docs"}
            ]}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_failover_from_broken_google_to_brave() {
    let (db, _dir) = create_test_db().await;
    let google = MockServer::start().await;
    let brave = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .expect(1)
        .mount(&google)
        .await;
    mount_brave_ok(&brave).await;

    let (dispatcher, _) = dispatcher_for(&db, &search_providers(&google.uri(), &brave.uri(), 100)).await;
    let outcome = dispatcher
        .dispatch(DispatchRequest::search("docker tutorial", 10, ProviderSelection::Auto))
        .await
        .unwrap();

    assert_eq!(outcome.provider, "brave");
    assert_eq!(outcome.attempts[0].provider, "google");
    assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::TransportError);
    match outcome.result {
        NormalizedResult::Search(hits) => assert_eq!(hits[0].url, "https://docs.docker.com"),
        other => panic!("unexpected result: {:?}", other),
    }

    // no refund for the failed google call
    let store = SqliteQuotaStore::new(db.pool.clone());
    assert_eq!(store.get_remaining("google").await.unwrap(), 99);
    assert_eq!(store.get_remaining("brave").await.unwrap(), 1999);
}

#[tokio::test]
async fn test_provider_429_is_transport_failure() {
    let (db, _dir) = create_test_db().await;
    let google = MockServer::start().await;
    let brave = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Daily Limit Exceeded"))
        .mount(&google)
        .await;
    mount_brave_ok(&brave).await;

    let (dispatcher, _) = dispatcher_for(&db, &search_providers(&google.uri(), &brave.uri(), 100)).await;
    let outcome = dispatcher
        .dispatch(DispatchRequest::search("q", 10, ProviderSelection::Auto))
        .await
        .unwrap();

    assert_eq!(outcome.provider, "brave");
    let detail = outcome.attempts[0].detail.clone().unwrap_or_default();
    assert!(detail.contains("quota exceeded"), "detail was {}", detail);
}

#[tokio::test]
async fn test_quota_survives_restart() {
    let (db, dir) = create_test_db().await;
    let google = MockServer::start().await;
    let brave = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&google)
        .await;

    let providers = search_providers(&google.uri(), &brave.uri(), 100);
    {
        let (dispatcher, _) = dispatcher_for(&db, &providers).await;
        for _ in 0..3 {
            dispatcher
                .dispatch(DispatchRequest::search("q", 5, ProviderSelection::Named("google".to_string())))
                .await
                .unwrap();
        }
    }
    db.pool.close().await;

    let reopened = Database::open(dir.path().join("quota.db")).await.unwrap();
    let (dispatcher, _) = dispatcher_for(&reopened, &providers).await;
    let status = dispatcher.quota_status().await.unwrap();
    let google_status = status.iter().find(|s| s.provider == "google").unwrap();

    assert_eq!(google_status.used, 3);
    assert_eq!(google_status.remaining, 97);
    assert!(google_status.active);
}

#[tokio::test]
async fn test_two_gateways_share_one_ceiling() {
    let (db, dir) = create_test_db().await;
    let other_db = Database::open(dir.path().join("quota.db")).await.unwrap();

    let google = MockServer::start().await;
    let brave = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&google)
        .await;

    // brave limited to zero so google is the only source of credits
    let mut providers = search_providers(&google.uri(), &brave.uri(), 6);
    for p in providers.iter_mut() {
        if p.name == "brave" {
            p.limit = 0;
        }
    }

    let (first, _) = dispatcher_for(&db, &providers).await;
    let (second, _) = dispatcher_for(&other_db, &providers).await;
    let first = Arc::new(first);
    let second = Arc::new(second);

    let mut handles = Vec::new();
    for i in 0..20 {
        let dispatcher = if i % 2 == 0 { first.clone() } else { second.clone() };
        handles.push(tokio::spawn(async move {
            dispatcher
                .dispatch(DispatchRequest::search(format!("q{}", i), 5, ProviderSelection::Auto))
                .await
        }));
    }

    let mut served = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => served += 1,
            Err(DispatchError::Capacity { .. }) => exhausted += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(served, 6);
    assert_eq!(exhausted, 14);
    assert_eq!(google.received_requests().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_reset_all_restores_and_emits_events() {
    let (db, _dir) = create_test_db().await;
    let google = MockServer::start().await;
    let brave = MockServer::start().await;
    mount_brave_ok(&brave).await;

    let (dispatcher, events) =
        dispatcher_for(&db, &search_providers(&google.uri(), &brave.uri(), 0)).await;
    dispatcher
        .dispatch(DispatchRequest::search("q", 5, ProviderSelection::Auto))
        .await
        .unwrap();
    events.drain();

    let before = dispatcher.quota_status().await.unwrap();
    let records = dispatcher.reset_quotas(&ResetTarget::All).await.unwrap();
    let after = dispatcher.quota_status().await.unwrap();

    assert_eq!(records.len(), 2);
    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(new.remaining, new.limit);
        assert!(new.reset_at >= old.reset_at);
    }
    let reset_events = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, UsageEvent::QuotaReset { .. }))
        .count();
    assert_eq!(reset_events, 2);
}
