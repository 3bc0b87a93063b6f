//! Client settings
//!
//! Deserialized from the `[api]` table of the CLI config. Everything except
//! the base URL has a default matching the stock backend routes.

use std::time::Duration;

use serde::Deserialize;
use session_auth::{
    DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH, DEFAULT_TOKEN_HEADER,
};

use crate::coordinator::GatePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    /// Applies to every transport call, including the refresh call.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_token_header")]
    pub token_header: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default)]
    pub refresh_policy: GatePolicy,
}

fn default_timeout() -> u64 {
    10
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

fn default_token_header() -> String {
    DEFAULT_TOKEN_HEADER.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

impl ClientConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            token_header: default_token_header(),
            login_path: default_login_path(),
            refresh_policy: GatePolicy::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(common::Error::invalid(
                "base_url",
                format!("must start with http:// or https://, got: {}", self.base_url),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(common::Error::invalid(
                "timeout_secs",
                "must be greater than 0",
            ));
        }
        for (field, path) in [
            ("refresh_path", &self.refresh_path),
            ("logout_path", &self.logout_path),
            ("login_path", &self.login_path),
        ] {
            if !path.starts_with('/') {
                return Err(common::Error::invalid(
                    field,
                    format!("must start with '/', got: {path}"),
                ));
            }
        }
        if self.token_header.trim().is_empty() {
            return Err(common::Error::invalid("token_header", "must not be empty"));
        }
        Ok(())
    }
}
