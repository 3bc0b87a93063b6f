//! reqwest-backed transport
//!
//! One `reqwest::Client` per transport, built with the global request timeout
//! and a `PersistentJar`. The jar plays the role of the browser: the HttpOnly
//! refresh cookie set by the login response is replayed to the refresh
//! endpoint automatically and is never visible to client code. Callers that
//! outlive a single process save `cookies()` and hand the restored jar to
//! `with_cookies` on the next start.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::cookies::PersistentJar;
use crate::{OutgoingRequest, Result, Transport, TransportError, TransportResponse};

/// Transport over a shared `reqwest::Client`.
///
/// Clone is cheap; the client keeps its connection pool and cookie jar
/// behind an `Arc`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    cookies: Arc<PersistentJar>,
}

impl ReqwestTransport {
    /// Build a transport for `base_url` with a fixed per-request timeout and
    /// an empty cookie jar.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_cookies(base_url, timeout, Arc::new(PersistentJar::new()))
    }

    /// Like `new`, starting from previously saved cookies.
    pub fn with_cookies(
        base_url: impl Into<String>,
        timeout: Duration,
        cookies: Arc<PersistentJar>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_provider(cookies.clone())
            .build()
            .map_err(|e| TransportError::Request(format!("building HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            cookies,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The jar backing this transport's requests.
    pub fn cookies(&self) -> &Arc<PersistentJar> {
        &self.cookies
    }

    /// Join a relative request URL onto the base URL. Absolute URLs pass
    /// through unchanged.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a OutgoingRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + 'a>> {
        Box::pin(self.execute(request))
    }
}

impl ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method, path = %request.path()))]
    async fn execute(&self, request: &OutgoingRequest) -> Result<TransportResponse> {
        let url = self.resolve(&request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok(TransportResponse::new(status, headers, body))
    }
}

/// Map a reqwest failure onto the transport error kinds.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}
