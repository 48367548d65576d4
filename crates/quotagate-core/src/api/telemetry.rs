//! Telemetry drain routes
//!
//! Each GET returns the buffered entries and clears the buffer.

use axum::{extract::State, routing::get, Json, Router};

use super::AppState;
use crate::models::{AttemptsResponse, EventsResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(drain_events))
        .route("/attempts", get(drain_attempts))
}

async fn drain_events(State(state): State<AppState>) -> Json<EventsResponse> {
    let events = state.events.drain();
    Json(EventsResponse {
        success: true,
        count: events.len(),
        events,
    })
}

async fn drain_attempts(State(state): State<AppState>) -> Json<AttemptsResponse> {
    let attempts = state.dispatcher.drain_attempts();
    Json(AttemptsResponse {
        success: true,
        count: attempts.len(),
        attempts,
    })
}
