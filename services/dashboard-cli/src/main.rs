//! Dashboard API client
//!
//! One-shot command line client that:
//! 1. Loads the session (cached token and cookies, and/or a seed token)
//! 2. Sends one request through the authenticated `ApiClient`
//! 3. Prints the response body, refreshing the access token on the way if
//!    the server asks for it
//! 4. Saves the cookie jar so the refresh cookie outlives the process

mod cli;
mod config;
mod session;

use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::RecordingNavigator;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;
use crate::config::Config;
use crate::session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs with LOG_LEVEL / RUST_LOG support. Logs go to stderr so the
    // response body on stdout stays clean.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    // Install before the client emits anything
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        refresh_policy = ?config.api.refresh_policy,
        fingerprint_headers = config.fingerprint_headers.len(),
        "configuration loaded"
    );

    let session = Session::open(&config).await?;
    let navigator = Arc::new(RecordingNavigator::new());
    let client = session.client(&config, navigator.clone())?;

    let result = client.send(args.request()).await;
    session.save().await;

    if args.metrics {
        eprintln!("{}", prometheus.render());
    }

    match result {
        Ok(response) => {
            info!(status = response.status.as_u16(), "request complete");
            println!("{}", response.text());
            Ok(())
        }
        Err(e) => {
            if let Some(location) = navigator.last_redirect() {
                warn!(location, "session ended, sign in again");
            }
            error!(error = %e, kind = e.label(), "request failed");
            Err(e).with_context(|| format!("{} {} failed", args.method, args.path))
        }
    }
}
