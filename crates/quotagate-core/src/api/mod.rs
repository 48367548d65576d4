//! API module - Axum routes
//!
//! ```text
//! POST /api/search              search with failover
//! POST /api/scrape              scrape with failover
//! GET  /api/quotas              per-provider usage
//! POST /api/reset-quotas        refill one provider or all
//! GET  /api/telemetry/events    drain usage events
//! GET  /api/telemetry/attempts  drain attempt log
//! GET  /health                  liveness
//! ```

pub mod dispatch;
pub mod error;
pub mod quotas;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::models::HealthResponse;
use crate::services::dispatch::Dispatcher;
use crate::services::telemetry::EventRecorder;

pub use error::ApiError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub events: Arc<EventRecorder>,
    /// Upper bound on a whole request, failover included
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, events: Arc<EventRecorder>) -> Self {
        Self {
            dispatcher,
            events,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let request_timeout = state.request_timeout;

    let api = Router::new()
        .merge(dispatch::routes())
        .merge(quotas::routes())
        .nest("/telemetry", telemetry::routes());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::map_response(move |response: Response| async move {
            timeout_body(response, request_timeout)
        }))
        .with_state(state)
}

/// The timeout layer answers with an empty 408; give it the usual error body
fn timeout_body(response: Response, after: Duration) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    log::warn!("[api] request exceeded {:?}", after);
    ApiError::timeout(after).into_response()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::version().to_string(),
        timestamp: Utc::now(),
    })
}
