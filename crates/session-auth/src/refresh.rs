//! Refresh endpoint protocol
//!
//! The refresh call is a bare `POST` with an empty body and no Authorization
//! header. The server authenticates it with the HttpOnly refresh cookie,
//! which the transport's cookie jar attaches; client code never sees that
//! cookie's value. A successful response carries the rotated access token in
//! a response header and the user/session object in the JSON body.
//!
//! Any other shape is a hard failure. Nothing here retries.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use transport::{OutgoingRequest, Transport, TransportResponse};

use crate::constants::{DEFAULT_REFRESH_PATH, DEFAULT_TOKEN_HEADER};
use crate::credentials::AccessToken;
use crate::error::{Error, Result};

/// Session object returned alongside a rotated token.
///
/// Only `user` is required; other fields are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user: serde_json::Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of a successful refresh call.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub access_token: AccessToken,
    pub session: SessionPayload,
}

/// Refresh endpoint location and the header the rotated token arrives in.
#[derive(Debug, Clone)]
pub struct RefreshProtocol {
    path: String,
    token_header: String,
}

impl Default for RefreshProtocol {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_PATH, DEFAULT_TOKEN_HEADER)
    }
}

impl RefreshProtocol {
    pub fn new(path: impl Into<String>, token_header: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            token_header: token_header.into().to_ascii_lowercase(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn token_header(&self) -> &str {
        &self.token_header
    }

    /// Whether `request` is a call to the refresh endpoint itself.
    pub fn is_refresh_request(&self, request: &OutgoingRequest) -> bool {
        request.targets(&self.path)
    }

    /// The bare refresh request: POST, empty body, no Authorization.
    ///
    /// Callers may stamp tracing headers on it before sending, but must not
    /// attach a bearer token.
    pub fn build_request(&self) -> OutgoingRequest {
        OutgoingRequest::post(self.path.clone())
    }

    /// Rotated token from a response header, if present and non-empty.
    pub fn rotated_token(&self, response: &TransportResponse) -> Option<AccessToken> {
        response
            .header_str(&self.token_header)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(AccessToken::new)
    }

    /// Send `request` (from `build_request`) and extract the rotated session.
    pub async fn refresh(
        &self,
        transport: &dyn Transport,
        request: &OutgoingRequest,
    ) -> Result<RefreshedSession> {
        debug!(path = %self.path, "requesting access token refresh");
        let response = transport.send(request).await?;
        self.parse_response(&response)
    }

    /// Validate a refresh response.
    pub fn parse_response(&self, response: &TransportResponse) -> Result<RefreshedSession> {
        if !response.is_success() {
            let status = response.status.as_u16();
            warn!(status, "refresh endpoint rejected the session");
            return Err(Error::Rejected {
                status,
                body: response.text(),
            });
        }

        let access_token = self.rotated_token(response).ok_or_else(|| {
            Error::InvalidRefreshResponse(format!("missing {} header", self.token_header))
        })?;

        let session: SessionPayload = response
            .json()
            .map_err(|e| Error::InvalidRefreshResponse(format!("unreadable session body: {e}")))?;
        if session.user.is_null() {
            return Err(Error::InvalidRefreshResponse(
                "session body has no user".into(),
            ));
        }

        Ok(RefreshedSession {
            access_token,
            session,
        })
    }
}
