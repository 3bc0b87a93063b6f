//! Client-side counters
//!
//! - `api_client_requests_total` (counter): label `outcome`
//! - `api_client_refresh_total` (counter): label `result`
//! - `api_client_retries_total` (counter)
//!
//! These are no-ops until the binary installs a recorder.

/// Record the final outcome of one logical request.
pub fn record_request(outcome: &str) {
    metrics::counter!("api_client_requests_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a refresh gate decision or refresh call result.
pub fn record_refresh(result: &str) {
    metrics::counter!("api_client_refresh_total", "result" => result.to_string()).increment(1);
}

/// Record a resend after a successful refresh.
pub fn record_retry() {
    metrics::counter!("api_client_retries_total").increment(1);
}
