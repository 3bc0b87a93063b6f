//! Transport abstraction for dashboard API calls
//!
//! Defines the request/response types that flow through the interceptors and
//! the `Transport` trait that actually puts them on the wire. The client layer
//! only ever talks to `dyn Transport`, so tests can substitute a recording
//! transport and production uses `ReqwestTransport`.

pub mod cookies;
pub mod reqwest_transport;

pub use cookies::{PersistentJar, StoredCookie};
pub use reqwest_transport::ReqwestTransport;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

/// Failure with no HTTP response attached (DNS, connect, timeout, body read).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Connect(_) => "connect",
            TransportError::Request(_) => "request",
        }
    }
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// A request as built by the caller and decorated by the interceptors.
///
/// `url` is either a path relative to the transport's base URL
/// (`/wallet`) or an absolute URL. `retried` is client metadata and is never
/// sent on the wire.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub retried: bool,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Path component of `url`, without scheme, host, or query string.
    pub fn path(&self) -> &str {
        let without_scheme = match self.url.find("://") {
            Some(idx) => {
                let rest = &self.url[idx + 3..];
                rest.find('/').map_or("/", |slash| &rest[slash..])
            }
            None => self.url.as_str(),
        };
        without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or(without_scheme)
    }

    /// Whether this request targets the given endpoint path.
    ///
    /// Matches on the path suffix so a base URL carrying a prefix
    /// (`https://host/api/auth/refresh`) still matches `/auth/refresh`.
    pub fn targets(&self, endpoint: &str) -> bool {
        self.path().ends_with(endpoint)
    }

    /// Bearer token currently attached, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }

    /// Replace any Authorization header with `Bearer <token>`.
    ///
    /// `HeaderMap::insert` drops every previous value, so the request carries
    /// exactly one Authorization header afterwards.
    pub fn set_bearer(&mut self, token: &str) -> std::result::Result<(), InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// A received HTTP response, fully buffered.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Header value as a string; `None` when absent or not visible ASCII.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends a fully decorated request and returns the buffered response.
///
/// Any non-error return carries an HTTP status, including 4xx/5xx; status
/// interpretation belongs to the caller. Uses `Pin<Box<dyn Future>>` so the
/// client can hold an `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a OutgoingRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_strips_scheme_host_and_query() {
        let req = OutgoingRequest::get("https://api.example.com/v1/wallet?page=2");
        assert_eq!(req.path(), "/v1/wallet");

        let req = OutgoingRequest::get("/goals?sort=asc#top");
        assert_eq!(req.path(), "/goals");

        let req = OutgoingRequest::get("https://api.example.com");
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn targets_matches_path_suffix() {
        let req = OutgoingRequest::post("https://host/api/auth/refresh");
        assert!(req.targets("/auth/refresh"));

        let req = OutgoingRequest::post("/auth/refresh?x=1");
        assert!(req.targets("/auth/refresh"));

        let req = OutgoingRequest::get("/auth/refresh-status");
        assert!(!req.targets("/auth/refresh"));
    }

    #[test]
    fn set_bearer_replaces_existing_authorization() {
        let mut req = OutgoingRequest::get("/wallet");
        req.headers
            .append(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        req.headers
            .append(AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        req.set_bearer("tok2").unwrap();

        let values: Vec<_> = req.headers.get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer tok2");
        assert_eq!(req.bearer(), Some("tok2"));
    }

    #[test]
    fn set_bearer_rejects_control_characters() {
        let mut req = OutgoingRequest::get("/wallet");
        assert!(req.set_bearer("bad\ntoken").is_err());
        assert!(req.bearer().is_none());
    }

    #[test]
    fn bearer_ignores_other_schemes() {
        let req = OutgoingRequest::get("/wallet")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(req.bearer().is_none());
    }

    #[test]
    fn response_helpers_read_headers_and_json() {
        let mut headers = HeaderMap::new();
        headers.insert("x-access-token", HeaderValue::from_static("tok3"));
        let resp = TransportResponse::new(
            StatusCode::OK,
            headers,
            r#"{"balance":1250}"#.as_bytes().to_vec(),
        );

        assert!(resp.is_success());
        assert_eq!(resp.header_str("X-Access-Token"), Some("tok3"));
        let body: serde_json::Value = resp.json().unwrap();
        assert_eq!(body["balance"], 1250);
        assert_eq!(resp.text(), r#"{"balance":1250}"#);
    }

    #[test]
    fn error_labels() {
        assert_eq!(TransportError::Timeout("t".into()).label(), "timeout");
        assert_eq!(TransportError::Connect("c".into()).label(), "connect");
        assert_eq!(TransportError::Request("r".into()).label(), "request");
    }
}
