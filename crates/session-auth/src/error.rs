//! Error types for session and refresh operations

use transport::TransportError;

/// Errors from the credential cache and the refresh protocol.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The refresh call never produced an HTTP response.
    #[error("refresh request failed: {0}")]
    Transport(#[from] TransportError),

    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// A success status without the rotated token header or session payload.
    #[error("invalid refresh response: {0}")]
    InvalidRefreshResponse(String),

    #[error("session cache error: {0}")]
    Cache(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
