//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! A seed access token comes from DASHBOARD_ACCESS_TOKEN or
//! access_token_file, never from the TOML directly.

use api_client::{ClientConfig, HeaderInjection};
use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Device fingerprint headers stamped on every request
    #[serde(default)]
    pub fingerprint_headers: Vec<HeaderInjection>,
}

/// Where the access token lives between runs
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// JSON session cache file. Without it the token lives in memory only.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Path to a file containing an access token to start with
    #[serde(default)]
    pub access_token_file: Option<PathBuf>,
    #[serde(skip)]
    pub access_token: Option<Secret<String>>,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Seed token resolution order:
    /// 1. DASHBOARD_ACCESS_TOKEN env var
    /// 2. access_token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("API_BASE_URL") {
            config.api.base_url = url;
        }
        config.api.validate()?;

        if let Ok(token) = std::env::var("DASHBOARD_ACCESS_TOKEN") {
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.session.access_token = Some(Secret::new(token));
            }
        } else if let Some(ref token_file) = config.session.access_token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read access_token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.session.access_token = Some(Secret::new(token));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("dashboard-client.toml")
    }
}
