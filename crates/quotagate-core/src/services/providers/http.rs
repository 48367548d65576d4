//! Shared HTTP client for provider adapters

use std::time::Duration;

use super::adapter::AdapterError;

const USER_AGENT: &str = concat!("quotagate/", env!("CARGO_PKG_VERSION"));

/// Build the client every adapter shares.
///
/// The request timeout is a backstop; the dispatcher enforces its own
/// invocation deadline around each call.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| AdapterError::Network(format!("failed to build HTTP client: {e}")))
}

/// Send a prepared request and return the body of a successful response.
///
/// Non-success statuses are classified through [`AdapterError::from_status`].
pub(crate) async fn send_for_body(request: reqwest::RequestBuilder) -> Result<String, AdapterError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AdapterError::from_status(status.as_u16(), &body));
    }

    Ok(body)
}

/// Join a base URL and an endpoint path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
