//! Search and scrape routes

use std::time::Instant;

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};

use super::{error::ApiError, AppState};
use crate::models::{ScrapeBody, ScrapeResponse, SearchBody, SearchResponse, DEFAULT_MAX_RESULTS};
use crate::services::dispatch::{DispatchRequest, ProviderSelection};
use crate::services::providers::NormalizedResult;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search))
        .route("/scrape", post(scrape))
}

/// Run a web search through the highest-priority provider with quota left
async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) = body?;
    let started = Instant::now();

    let query = body.query.unwrap_or_default();
    let request = DispatchRequest::search(
        query.clone(),
        body.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        ProviderSelection::parse(body.provider.as_deref()),
    )
    .with_skip_cache(body.skip_cache);

    let outcome = state.dispatcher.dispatch(request).await?;
    let results = match outcome.result {
        NormalizedResult::Search(hits) => hits,
        NormalizedResult::Scrape { .. } => Vec::new(),
    };

    Ok(Json(SearchResponse {
        success: true,
        provider: outcome.provider,
        query: query.trim().to_string(),
        results_count: results.len(),
        results,
        execution_time_ms: started.elapsed().as_millis() as u64,
        remaining_quota: outcome.remaining_quota,
        cached: outcome.cached,
        attempts: outcome.attempts,
    }))
}

/// Fetch a page through a scrape provider
async fn scrape(
    State(state): State<AppState>,
    body: Result<Json<ScrapeBody>, JsonRejection>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let Json(body) = body?;
    let started = Instant::now();

    let url = body.url.unwrap_or_default();
    let request = DispatchRequest::scrape(
        url.clone(),
        body.render_js,
        body.use_premium_proxy,
        ProviderSelection::parse(body.provider.as_deref()),
    );

    let outcome = state.dispatcher.dispatch(request).await?;
    let content = match outcome.result {
        NormalizedResult::Scrape { content } => content,
        NormalizedResult::Search(_) => String::new(),
    };

    Ok(Json(ScrapeResponse {
        success: true,
        provider: outcome.provider,
        url: url.trim().to_string(),
        content,
        credits_used: outcome.credits_used,
        execution_time_ms: started.elapsed().as_millis() as u64,
        remaining_quota: outcome.remaining_quota,
        attempts: outcome.attempts,
    }))
}
