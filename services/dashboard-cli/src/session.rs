//! Session state carried between runs
//!
//! The access token and the transport's cookie jar both live in the session
//! cache. Restoring both lets a later run refresh an expired token with the
//! HttpOnly refresh cookie from an earlier login.

use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::{ApiClient, Navigator, StaticFingerprint};
use session_auth::{
    AccessToken, COOKIE_JAR_CACHE_KEY, CredentialStore, FileSessionCache, MemorySessionCache,
    SessionCache,
};
use tracing::{debug, info, warn};
use transport::{PersistentJar, ReqwestTransport};

use crate::config::Config;

pub struct Session {
    cache: Arc<dyn SessionCache>,
    store: Arc<CredentialStore>,
    cookies: Arc<PersistentJar>,
}

impl Session {
    /// Open the configured cache and restore the token and cookies from it.
    /// A seed token from the config replaces any cached one.
    pub async fn open(config: &Config) -> Result<Self> {
        let cache: Arc<dyn SessionCache> = match &config.session.cache_path {
            Some(path) => Arc::new(
                FileSessionCache::open(path.clone())
                    .await
                    .with_context(|| format!("failed to open session cache {}", path.display()))?,
            ),
            None => Arc::new(MemorySessionCache::new()),
        };

        let store = Arc::new(CredentialStore::load(cache.clone()).await);
        if let Some(token) = &config.session.access_token {
            store.set(AccessToken::new(token.expose().clone())).await;
        }
        let cookies = restore_cookies(cache.as_ref()).await;

        Ok(Self {
            cache,
            store,
            cookies,
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Client over a transport that uses this session's cookie jar.
    pub fn client(&self, config: &Config, navigator: Arc<dyn Navigator>) -> Result<ApiClient> {
        let transport = ReqwestTransport::with_cookies(
            &config.api.base_url,
            config.api.timeout(),
            self.cookies.clone(),
        )
        .context("failed to build HTTP client")?;

        Ok(ApiClient::builder(Arc::new(transport), self.store.clone())
            .configure(&config.api)
            .navigator(navigator)
            .fingerprint(Arc::new(StaticFingerprint::new(
                config.fingerprint_headers.clone(),
            )))
            .build())
    }

    /// Write the cookie jar back to the cache. Failures are logged only; the
    /// next run then starts without cookies.
    pub async fn save(&self) {
        let json = match self.cookies.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize cookie jar");
                return;
            }
        };
        match self.cache.set(COOKIE_JAR_CACHE_KEY, &json).await {
            Ok(()) => debug!(cookies = self.cookies.snapshot().len(), "cookie jar saved"),
            Err(e) => warn!(error = %e, "failed to save cookie jar to session cache"),
        }
    }
}

async fn restore_cookies(cache: &dyn SessionCache) -> Arc<PersistentJar> {
    let jar = match cache.get(COOKIE_JAR_CACHE_KEY).await {
        Ok(Some(json)) => match PersistentJar::from_json(&json) {
            Ok(jar) => {
                info!(cookies = jar.snapshot().len(), "restored cookie jar from session cache");
                jar
            }
            Err(e) => {
                warn!(error = %e, "cached cookie jar unreadable, starting without cookies");
                PersistentJar::new()
            }
        },
        Ok(None) => PersistentJar::new(),
        Err(e) => {
            warn!(error = %e, "session cache unreadable, starting without cookies");
            PersistentJar::new()
        }
    };
    Arc::new(jar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use api_client::{ClientConfig, RecordingNavigator};
    use axum::http::{HeaderMap, StatusCode};
    use std::path::PathBuf;
    use tokio::net::TcpListener;

    fn config(base_url: String, cache_path: Option<PathBuf>) -> Config {
        Config {
            api: ClientConfig::new(base_url),
            session: SessionConfig {
                cache_path,
                ..SessionConfig::default()
            },
            fingerprint_headers: Vec::new(),
        }
    }

    /// Login sets the refresh cookie and a short-lived token; `/wallet` only
    /// accepts the token issued by `/auth/refresh`.
    async fn spawn_backend() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/auth/login",
                    axum::routing::post(|| async {
                        (
                            StatusCode::OK,
                            [
                                ("set-cookie", "refresh_token=rt_abc; HttpOnly; Path=/"),
                                ("x-access-token", "expired"),
                            ],
                            r#"{"user":{"id":7}}"#,
                        )
                    }),
                )
                .route(
                    "/auth/refresh",
                    axum::routing::post(|headers: HeaderMap| async move {
                        let has_cookie = headers
                            .get("cookie")
                            .and_then(|v| v.to_str().ok())
                            .is_some_and(|v| v.contains("refresh_token=rt_abc"));
                        if has_cookie {
                            (StatusCode::OK, [("x-access-token", "fresh")], r#"{"user":{"id":7}}"#)
                        } else {
                            (StatusCode::UNAUTHORIZED, [("x-access-token", "")], "{}")
                        }
                    }),
                )
                .route(
                    "/wallet",
                    axum::routing::get(|headers: HeaderMap| async move {
                        let authorized = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            == Some("Bearer fresh");
                        if authorized {
                            (StatusCode::OK, r#"{"balance":10}"#)
                        } else {
                            (StatusCode::UNAUTHORIZED, "{}")
                        }
                    }),
                );
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn refresh_cookie_survives_restart() {
        let base = spawn_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config(base, Some(dir.path().join("session.json")));

        {
            let session = Session::open(&config).await.unwrap();
            let client = session
                .client(&config, Arc::new(RecordingNavigator::new()))
                .unwrap();
            client
                .post("/auth/login", &serde_json::json!({}))
                .await
                .unwrap();
            session.save().await;
        }

        let session = Session::open(&config).await.unwrap();
        assert_eq!(
            session.credentials().get().await.unwrap().expose(),
            "expired"
        );
        let navigator = Arc::new(RecordingNavigator::new());
        let client = session.client(&config, navigator.clone()).unwrap();

        let wallet: serde_json::Value = client.get_json("/wallet").await.unwrap();

        assert_eq!(wallet["balance"], 10);
        assert_eq!(session.credentials().get().await.unwrap().expose(), "fresh");
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn without_saved_cookies_restart_cannot_refresh() {
        let base = spawn_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config(base, Some(dir.path().join("session.json")));

        {
            let session = Session::open(&config).await.unwrap();
            let client = session
                .client(&config, Arc::new(RecordingNavigator::new()))
                .unwrap();
            client
                .post("/auth/login", &serde_json::json!({}))
                .await
                .unwrap();
        }

        let session = Session::open(&config).await.unwrap();
        let navigator = Arc::new(RecordingNavigator::new());
        let client = session.client(&config, navigator.clone()).unwrap();

        assert!(client.get("/wallet").await.is_err());
        assert_eq!(navigator.redirects(), vec!["/login"]);
    }

    #[tokio::test]
    async fn unreadable_cached_jar_starts_empty() {
        let cache = MemorySessionCache::new();
        cache.set(COOKIE_JAR_CACHE_KEY, "{not json").await.unwrap();

        let jar = restore_cookies(&cache).await;

        assert!(jar.is_empty());
    }

    #[tokio::test]
    async fn seed_token_overrides_cached_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut config = config("http://127.0.0.1:1".into(), Some(path));
        {
            let session = Session::open(&config).await.unwrap();
            session.credentials().set("cached".into()).await;
        }

        config.session.access_token = Some(common::Secret::new("seeded".to_string()));
        let session = Session::open(&config).await.unwrap();

        assert_eq!(session.credentials().get().await.unwrap().expose(), "seeded");
    }
}
