//! Authenticated API client
//!
//! Per-request state machine:
//! - 2xx: store any rotated token from the response header, return response
//! - transport error: `ApiError::Network`, no retry
//! - 401 from the refresh endpoint itself: clear credentials, redirect to
//!   login, `ApiError::AuthorizationExpired`, never refresh
//! - first 401: mark the request retried, refresh through the coordinator,
//!   set the new bearer on the same request and resend it once
//! - 401 after the retry, or no token from the refresh: clear credentials,
//!   redirect to login, `ApiError::AuthenticationFailed`
//! - any other status: `ApiError::Http`, untouched

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use session_auth::{
    AccessToken, CredentialStore, DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, RefreshProtocol,
    SessionPayload,
};
use tracing::{Span, debug, info, instrument, warn};
use transport::{OutgoingRequest, ReqwestTransport, Transport, TransportResponse};

use crate::config::ClientConfig;
use crate::coordinator::{GatePolicy, RefreshCoordinator};
use crate::error::{ApiError, Result};
use crate::interceptor::{
    FingerprintProvider, PassthroughSanitizer, RequestInterceptor, Sanitizer, StaticFingerprint,
};
use crate::navigator::{Navigator, RecordingNavigator};

/// Client wrapping a transport with the token lifecycle.
///
/// Share it behind an `Arc`; all state is internally synchronized.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    interceptor: Arc<RequestInterceptor>,
    coordinator: RefreshCoordinator,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    logout_path: String,
}

impl ApiClient {
    pub fn builder(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> ApiClientBuilder {
        ApiClientBuilder::new(transport, store)
    }

    /// Client over a `ReqwestTransport` configured from `config`.
    pub fn from_config(
        config: &ClientConfig,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        fingerprint: Arc<dyn FingerprintProvider>,
    ) -> transport::Result<Self> {
        let transport = ReqwestTransport::new(&config.base_url, config.timeout())?;
        Ok(Self::builder(Arc::new(transport), store)
            .configure(config)
            .navigator(navigator)
            .fingerprint(fingerprint)
            .build())
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send a request through the interceptors.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path(), request_id = tracing::field::Empty))]
    pub async fn send(&self, mut request: OutgoingRequest) -> Result<TransportResponse> {
        let request_id = self.interceptor.prepare(&mut request).await;
        Span::current().record("request_id", request_id.as_str());

        let result = self.dispatch(request).await;
        match &result {
            Ok(response) => {
                debug!(status = response.status.as_u16(), "request succeeded");
                crate::metrics::record_request("ok");
            }
            Err(e) => {
                debug!(error = %e, "request failed");
                crate::metrics::record_request(e.label());
            }
        }
        result
    }

    /// Send/inspect loop. Runs at most twice: `retried` is set before the
    /// second pass and a 401 on a retried request is terminal.
    async fn dispatch(&self, mut request: OutgoingRequest) -> Result<TransportResponse> {
        loop {
            let response = match self.transport.send(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, kind = e.label(), "no response from server");
                    return Err(ApiError::Network(e));
                }
            };

            if response.is_success() {
                self.rotate_token(&response).await;
                return Ok(response);
            }

            if response.status != StatusCode::UNAUTHORIZED {
                return Err(ApiError::Http {
                    status: response.status.as_u16(),
                    body: response.text(),
                });
            }

            if self.coordinator.protocol().is_refresh_request(&request) {
                warn!(login_path = %self.login_path, "refresh endpoint answered 401, clearing credentials");
                self.store.clear().await;
                self.navigator.redirect(&self.login_path);
                return Err(ApiError::AuthorizationExpired);
            }

            if request.retried {
                return Err(self
                    .fail_authentication("request rejected again after token refresh")
                    .await);
            }
            request.retried = true;

            let token = match self.coordinator.refresh().await {
                Ok(Some(token)) => token,
                Ok(None) => {
                    return Err(self
                        .fail_authentication("no access token available, refresh unavailable")
                        .await);
                }
                Err(e) => {
                    return Err(self
                        .fail_authentication(&format!("token refresh failed: {e}"))
                        .await);
                }
            };

            if let Err(e) = request.set_bearer(token.expose()) {
                return Err(self
                    .fail_authentication(&format!("refreshed token is not a valid header: {e}"))
                    .await);
            }
            info!("retrying request with refreshed token");
            crate::metrics::record_retry();
        }
    }

    /// Store a rotated token carried on a successful response.
    async fn rotate_token(&self, response: &TransportResponse) {
        if let Some(token) = self.coordinator.protocol().rotated_token(response) {
            debug!("response carried a rotated access token");
            self.store.set(token).await;
        }
    }

    /// Terminal auth failure: clear credentials and send the user to login.
    async fn fail_authentication(&self, reason: &str) -> ApiError {
        warn!(reason, login_path = %self.login_path, "session could not be recovered");
        self.store.clear().await;
        self.navigator.redirect(&self.login_path);
        ApiError::AuthenticationFailed(reason.to_string())
    }

    pub async fn get(&self, url: &str) -> Result<TransportResponse> {
        self.send(OutgoingRequest::get(url)).await
    }

    pub async fn delete(&self, url: &str) -> Result<TransportResponse> {
        self.send(OutgoingRequest::delete(url)).await
    }

    pub async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<TransportResponse> {
        self.send(OutgoingRequest::post(url).with_body(to_value(body)?))
            .await
    }

    pub async fn put<B: Serialize>(&self, url: &str, body: &B) -> Result<TransportResponse> {
        self.send(OutgoingRequest::put(url).with_body(to_value(body)?))
            .await
    }

    /// GET and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        response
            .json()
            .map_err(|e| ApiError::Decode(format!("{url}: {e}")))
    }

    /// Record the access token returned by a login call.
    pub async fn login(&self, token: AccessToken) {
        self.store.set(token).await;
        info!("signed in");
    }

    /// Best-effort server logout, then drop local credentials.
    ///
    /// Sent directly through the transport so a 401 here cannot start a
    /// refresh.
    pub async fn logout(&self) {
        let mut request = OutgoingRequest::post(self.logout_path.clone());
        self.interceptor.prepare(&mut request).await;
        match self.transport.send(&request).await {
            Ok(response) if response.is_success() => debug!("server session closed"),
            Ok(response) => {
                debug!(status = response.status.as_u16(), "logout endpoint declined")
            }
            Err(e) => warn!(error = %e, "logout request failed"),
        }
        self.store.clear().await;
        info!("signed out");
    }

    /// Explicit refresh, e.g. to restore a session at startup from the
    /// refresh cookie alone. Clears credentials on failure but does not
    /// redirect; the caller decides.
    pub async fn refresh_session(&self) -> Result<SessionPayload> {
        match self.coordinator.refresh_session().await {
            Ok(Some(refreshed)) => Ok(refreshed.session),
            Ok(None) => Err(ApiError::AuthenticationFailed(
                "refresh unavailable right now".into(),
            )),
            Err(e) => {
                self.store.clear().await;
                Err(match e {
                    session_auth::Error::Transport(e) => ApiError::Network(e),
                    session_auth::Error::Rejected { status: 401, .. } => {
                        ApiError::AuthorizationExpired
                    }
                    session_auth::Error::Rejected { status, body } => {
                        ApiError::Http { status, body }
                    }
                    session_auth::Error::InvalidRefreshResponse(msg) => {
                        ApiError::InvalidRefreshResponse(msg)
                    }
                    session_auth::Error::Cache(msg) => ApiError::AuthenticationFailed(msg),
                })
            }
        }
    }
}

fn to_value<B: Serialize>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode(format!("encoding request body: {e}")))
}

/// Builder for `ApiClient`. Collaborators default to no-op implementations.
pub struct ApiClientBuilder {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    protocol: RefreshProtocol,
    policy: GatePolicy,
    navigator: Option<Arc<dyn Navigator>>,
    sanitizer: Option<Arc<dyn Sanitizer>>,
    fingerprint: Option<Arc<dyn FingerprintProvider>>,
    login_path: String,
    logout_path: String,
}

impl ApiClientBuilder {
    fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> Self {
        Self {
            transport,
            store,
            protocol: RefreshProtocol::default(),
            policy: GatePolicy::default(),
            navigator: None,
            sanitizer: None,
            fingerprint: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }

    /// Endpoint paths, token header and gate policy from `config`.
    pub fn configure(self, config: &ClientConfig) -> Self {
        self.refresh_protocol(RefreshProtocol::new(
            &config.refresh_path,
            &config.token_header,
        ))
        .policy(config.refresh_policy)
        .login_path(&config.login_path)
        .logout_path(&config.logout_path)
    }

    pub fn refresh_protocol(mut self, protocol: RefreshProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn fingerprint(mut self, fingerprint: Arc<dyn FingerprintProvider>) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    pub fn build(self) -> ApiClient {
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(RecordingNavigator::new()));
        let interceptor = Arc::new(RequestInterceptor::new(
            self.store.clone(),
            self.sanitizer
                .unwrap_or_else(|| Arc::new(PassthroughSanitizer)),
            self.fingerprint
                .unwrap_or_else(|| Arc::new(StaticFingerprint::default())),
        ));
        let coordinator = RefreshCoordinator::new(
            self.protocol,
            self.policy,
            self.transport.clone(),
            self.store.clone(),
            interceptor.clone(),
            navigator.clone(),
        );

        ApiClient {
            transport: self.transport,
            store: self.store,
            interceptor,
            coordinator,
            navigator,
            login_path: self.login_path,
            logout_path: self.logout_path,
        }
    }
}
