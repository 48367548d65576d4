//! HTTP error mapping

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::ErrorResponse;
use crate::services::dispatch::DispatchError;

/// Status code plus JSON error body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::new(message),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            status: StatusCode::REQUEST_TIMEOUT,
            body: ErrorResponse::new(format!("Request timed out after {} ms", after.as_millis())),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Validation(_) => Self::bad_request(message),
            DispatchError::UnknownProvider(_) => Self {
                status: StatusCode::NOT_FOUND,
                body: ErrorResponse::new(message),
            },
            DispatchError::Capacity {
                checked, attempts, ..
            } => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                body: ErrorResponse {
                    checked: Some(checked),
                    attempts: Some(attempts),
                    ..ErrorResponse::new(message)
                },
            },
            DispatchError::Transport { attempts, .. } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: ErrorResponse {
                    attempts: Some(attempts),
                    ..ErrorResponse::new(message)
                },
            },
            DispatchError::Store { source, attempts } => {
                log::error!("[api] store failure: {}", source);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: ErrorResponse {
                        attempts: (!attempts.is_empty()).then_some(attempts),
                        ..ErrorResponse::new(message)
                    },
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dispatch::{Attempt, AttemptOutcome};
    use crate::services::quota::Capability;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DispatchError::Validation("x".to_string()), StatusCode::BAD_REQUEST),
            (DispatchError::UnknownProvider("bing".to_string()), StatusCode::NOT_FOUND),
            (
                DispatchError::Capacity {
                    capability: Capability::Scrape,
                    checked: vec![],
                    attempts: vec![],
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                DispatchError::Transport {
                    message: "boom".to_string(),
                    attempts: vec![],
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_store_failure_keeps_attempts() {
        let attempt = Attempt {
            provider: "google".to_string(),
            outcome: AttemptOutcome::TransportError,
            detail: Some("Network error: Connection failed".to_string()),
            latency_ms: 3,
            timestamp: chrono::Utc::now(),
        };
        let err = ApiError::from(DispatchError::Store {
            source: crate::error::Error::internal("disk I/O error"),
            attempts: vec![attempt],
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.attempts.unwrap()[0].provider, "google");

        let bare = ApiError::from(DispatchError::from(crate::error::Error::internal("x")));
        assert!(bare.body.attempts.is_none());
    }

    #[test]
    fn test_capacity_body_lists_checked() {
        let err = ApiError::from(DispatchError::Capacity {
            capability: Capability::Search,
            checked: vec!["google".to_string(), "brave".to_string()],
            attempts: vec![],
        });
        assert_eq!(err.body.error, "All search providers exhausted");
        assert_eq!(err.body.checked.unwrap().len(), 2);
    }
}
