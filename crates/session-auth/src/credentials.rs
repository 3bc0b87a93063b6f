//! Access token storage
//!
//! The credential store is the single source of truth for the current access
//! token. It hydrates from the session cache exactly once, at construction,
//! and mirrors every change back to the cache. Cache failures never surface
//! to callers: a failed write only means the token will not survive a
//! restart.

use std::fmt;
use std::sync::Arc;

use common::Secret;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{MemorySessionCache, SessionCache};
use crate::constants::ACCESS_TOKEN_CACHE_KEY;

/// Short-lived bearer credential. Redacted in Debug/Display.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", self.0)
    }
}

/// Holds the current access token in memory, mirrored to a session cache.
///
/// The RwLock is held across the cache write in `set`/`clear` so the cache
/// never ends up behind the in-memory value when two updates race.
pub struct CredentialStore {
    cache: Arc<dyn SessionCache>,
    token: RwLock<Option<AccessToken>>,
}

impl CredentialStore {
    /// Build a store and hydrate it from `cache`.
    ///
    /// An unreadable cache or an empty cached value yields an empty store.
    pub async fn load(cache: Arc<dyn SessionCache>) -> Self {
        let token = match cache.get(ACCESS_TOKEN_CACHE_KEY).await {
            Ok(Some(value)) if !value.is_empty() => {
                info!("restored access token from session cache");
                Some(AccessToken::new(value))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "session cache unreadable, starting without a token");
                None
            }
        };

        Self {
            cache,
            token: RwLock::new(token),
        }
    }

    /// Empty store backed by process memory only.
    pub fn in_memory() -> Self {
        Self {
            cache: Arc::new(MemorySessionCache::new()),
            token: RwLock::new(None),
        }
    }

    /// Current token, or `None` if never set or cleared.
    pub async fn get(&self) -> Option<AccessToken> {
        self.token.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Replace the token and mirror it into the session cache.
    pub async fn set(&self, token: AccessToken) {
        let mut current = self.token.write().await;
        if let Err(e) = self.cache.set(ACCESS_TOKEN_CACHE_KEY, token.expose()).await {
            warn!(error = %e, "failed to mirror access token to session cache");
        }
        *current = Some(token);
        debug!("access token updated");
    }

    /// Drop the token from memory and from the session cache.
    pub async fn clear(&self) {
        let mut current = self.token.write().await;
        *current = None;
        if let Err(e) = self.cache.remove(ACCESS_TOKEN_CACHE_KEY).await {
            warn!(error = %e, "failed to remove access token from session cache");
        }
        debug!("access token cleared");
    }
}
