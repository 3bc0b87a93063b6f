//! Error taxonomy surfaced to API callers

use transport::TransportError;

/// Errors returned by `ApiClient`.
///
/// A first 401 on an ordinary request never reaches the caller when the
/// refresh succeeds. Everything else propagates immediately.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No HTTP response was received (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// 401 from the refresh endpoint itself. Credentials are cleared.
    #[error("authorization expired")]
    AuthorizationExpired,

    /// The session could not be recovered: the refresh failed, was
    /// unavailable, or the retried request was rejected again. Credentials
    /// are cleared and the user is sent to login.
    #[error("session expired: {0}")]
    AuthenticationFailed(String),

    /// The refresh endpoint answered 2xx without a token header or session
    /// body. Only returned from an explicit `ApiClient::refresh_session`.
    #[error("invalid refresh response: {0}")]
    InvalidRefreshResponse(String),

    /// Any other non-success status, passed through untouched.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A success body did not match the expected type.
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status associated with this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthorizationExpired => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the user must sign in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            ApiError::AuthorizationExpired
                | ApiError::AuthenticationFailed(_)
                | ApiError::InvalidRefreshResponse(_)
        )
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ApiError::Network(_) => "network_error",
            ApiError::AuthorizationExpired => "authorization_expired",
            ApiError::AuthenticationFailed(_) => "authentication_failed",
            ApiError::InvalidRefreshResponse(_) => "invalid_refresh_response",
            ApiError::Http { .. } => "http_error",
            ApiError::Decode(_) => "decode_error",
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;
