//! Authenticated client for the dashboard API
//!
//! Wraps a `Transport` with the bearer-token lifecycle:
//! 1. `RequestInterceptor` attaches the current token, a request ID and the
//!    client fingerprint headers, and sanitizes the body
//! 2. The transport sends the request
//! 3. `ApiClient` inspects the response: a rotated token header updates the
//!    credential store; a first 401 goes through `RefreshCoordinator` and the
//!    request is resent exactly once with the new token
//! 4. Unrecoverable auth failures clear the store and redirect to login via
//!    the `Navigator`
//!
//! The coordinator owns the only shared refresh state. With the default
//! `GatePolicy::Reject`, a caller arriving while a refresh is in flight gets
//! no token and fails instead of waiting; `GatePolicy::Await` lets it share
//! the in-flight result.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod interceptor;
pub mod metrics;
pub mod navigator;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use coordinator::{GatePolicy, RefreshCoordinator};
pub use error::{ApiError, Result};
pub use interceptor::{
    FingerprintProvider, HeaderInjection, PassthroughSanitizer, RequestInterceptor, Sanitizer,
    StaticFingerprint, generate_request_id,
};
pub use navigator::{Navigator, RecordingNavigator};
