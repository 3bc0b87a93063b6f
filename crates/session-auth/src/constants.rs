//! Endpoint and header defaults for the dashboard backend
//!
//! All of these can be overridden through client configuration; the values
//! here match the backend's stock routes.

/// Refresh endpoint. Takes an empty POST body and authenticates with the
/// HttpOnly refresh cookie only.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Logout endpoint. Invalidates the refresh cookie server-side.
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";

/// Response header carrying a freshly issued (possibly rotated) access token.
pub const DEFAULT_TOKEN_HEADER: &str = "x-access-token";

/// Application route to send the user to after an unrecoverable auth failure.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Session cache key under which the access token is mirrored.
pub const ACCESS_TOKEN_CACHE_KEY: &str = "accessToken";

/// Session cache key under which the transport's cookie jar is saved, so the
/// refresh cookie lives exactly as long as the cached access token.
pub const COOKIE_JAR_CACHE_KEY: &str = "cookieJar";
