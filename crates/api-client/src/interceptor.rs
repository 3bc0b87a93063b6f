//! Outgoing request decoration
//!
//! Runs before every transport send. Attaches the bearer token when one is
//! stored, stamps a request ID and the client fingerprint headers, and passes
//! the body through the sanitizer. It never fails a request: a missing or
//! unusable token just means the request goes out unauthenticated and the
//! server decides.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngExt;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use serde::Deserialize;
use session_auth::CredentialStore;
use tracing::warn;
use transport::OutgoingRequest;

/// Correlation header stamped on every request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Cleans request bodies before they leave the client.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, body: serde_json::Value) -> serde_json::Value;
}

/// Sanitizer that leaves bodies untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughSanitizer;

impl Sanitizer for PassthroughSanitizer {
    fn sanitize(&self, body: serde_json::Value) -> serde_json::Value {
        body
    }
}

/// Supplies device fingerprint / automation signal headers.
///
/// Values are opaque to the client.
pub trait FingerprintProvider: Send + Sync {
    fn headers(&self) -> Vec<(String, String)>;
}

/// Header name/value pair from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderInjection {
    pub name: String,
    pub value: String,
}

/// Fingerprint provider with a fixed header set.
#[derive(Debug, Default, Clone)]
pub struct StaticFingerprint {
    headers: Vec<HeaderInjection>,
}

impl StaticFingerprint {
    pub fn new(headers: Vec<HeaderInjection>) -> Self {
        Self { headers }
    }
}

impl FingerprintProvider for StaticFingerprint {
    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect()
    }
}

/// Decorates outgoing requests with credentials and client signals.
pub struct RequestInterceptor {
    store: Arc<CredentialStore>,
    sanitizer: Arc<dyn Sanitizer>,
    fingerprint: Arc<dyn FingerprintProvider>,
}

impl RequestInterceptor {
    pub fn new(
        store: Arc<CredentialStore>,
        sanitizer: Arc<dyn Sanitizer>,
        fingerprint: Arc<dyn FingerprintProvider>,
    ) -> Self {
        Self {
            store,
            sanitizer,
            fingerprint,
        }
    }

    /// Full decoration for an ordinary API request. Returns the request ID.
    pub async fn prepare(&self, request: &mut OutgoingRequest) -> String {
        let request_id = self.stamp(request);

        if let Some(token) = self.store.get().await {
            if let Err(e) = request.set_bearer(token.expose()) {
                warn!(error = %e, "stored access token is not a valid header value, sending without it");
                request.headers.remove(AUTHORIZATION);
            }
        }

        if let Some(body) = request.body.take() {
            request.body = Some(self.sanitizer.sanitize(body));
        }

        request_id
    }

    /// Request ID and fingerprint headers only, no credentials. Used for the
    /// refresh call, which must not carry a bearer token.
    pub fn stamp(&self, request: &mut OutgoingRequest) -> String {
        let request_id = generate_request_id();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            request
                .headers
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        for (name, value) in self.fingerprint.headers() {
            let name = match HeaderName::from_str(&name) {
                Ok(n) => n,
                Err(e) => {
                    warn!(header = %name, error = %e, "skipping invalid fingerprint header name");
                    continue;
                }
            };
            if name == AUTHORIZATION {
                warn!(header = %name, "refusing to let fingerprint headers set authorization");
                continue;
            }
            let value = match HeaderValue::from_str(&value) {
                Ok(v) => v,
                Err(e) => {
                    warn!(header = %name, error = %e, "skipping invalid fingerprint header value");
                    continue;
                }
            };
            request.headers.insert(name, value);
        }

        request_id
    }
}

/// `<unix millis>-<9 random base36 chars>`, e.g. `1760774400000-k3j9x0q2a`.
pub fn generate_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("{millis}-{suffix}")
}
