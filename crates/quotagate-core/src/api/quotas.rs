//! Quota status and reset routes

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};

use super::{error::ApiError, AppState};
use crate::models::{QuotaStatusResponse, ResetBody, ResetResponse};
use crate::services::quota::ResetTarget;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quotas", get(quota_status))
        .route("/reset-quotas", post(reset_quotas))
}

/// Current usage for every registered provider
async fn quota_status(State(state): State<AppState>) -> Result<Json<QuotaStatusResponse>, ApiError> {
    let quotas = state.dispatcher.quota_status().await?;
    Ok(Json(QuotaStatusResponse {
        success: true,
        quotas,
    }))
}

/// Refill one provider or all of them
async fn reset_quotas(
    State(state): State<AppState>,
    body: Result<Json<ResetBody>, JsonRejection>,
) -> Result<Json<ResetResponse>, ApiError> {
    let Json(body) = body?;
    let target = ResetTarget::parse(body.provider.as_deref().unwrap_or("all"));

    let records = state.dispatcher.reset_quotas(&target).await?;
    log::info!("[api] reset {} quota record(s) for {}", records.len(), target);

    let message = match &target {
        ResetTarget::All => format!("Reset {} provider quota(s)", records.len()),
        ResetTarget::Provider(name) => format!("Reset quota for {}", name),
    };

    Ok(Json(ResetResponse {
        success: true,
        message,
        provider: target.to_string(),
    }))
}
