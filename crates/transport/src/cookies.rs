//! Cookie jar that can outlive the process
//!
//! Wraps `reqwest::cookie::Jar` and remembers every `Set-Cookie` header it
//! accepted, keyed by cookie name and host. The remembered headers are the
//! persisted form: restoring replays them into a fresh jar, so domain, path
//! and expiry rules stay with reqwest.

use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One accepted `Set-Cookie` header and the URL that set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub url: String,
    pub set_cookie: String,
}

/// Cookie store for `ReqwestTransport` with a JSON snapshot.
#[derive(Default)]
pub struct PersistentJar {
    jar: Jar,
    accepted: Mutex<Vec<StoredCookie>>,
}

impl PersistentJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a jar from a `snapshot()`. Entries with an unparsable URL are
    /// skipped.
    pub fn restore(cookies: Vec<StoredCookie>) -> Self {
        let restored = Self::new();
        for cookie in cookies {
            match Url::parse(&cookie.url) {
                Ok(url) => restored.accept(&cookie.set_cookie, &url),
                Err(e) => warn!(url = %cookie.url, error = %e, "dropping stored cookie"),
            }
        }
        restored
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::restore(serde_json::from_str(json)?))
    }

    /// Every `Set-Cookie` header currently remembered, oldest first.
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        self.lock_accepted().clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.lock_accepted())
    }

    pub fn is_empty(&self) -> bool {
        self.lock_accepted().is_empty()
    }

    fn accept(&self, set_cookie: &str, url: &Url) {
        self.jar.add_cookie_str(set_cookie, url);

        let Some(name) = cookie_name(set_cookie) else {
            return;
        };
        let mut accepted = self.lock_accepted();
        // A later header for the same cookie replaces the earlier one.
        accepted.retain(|stored| {
            let same_host =
                Url::parse(&stored.url).is_ok_and(|stored_url| stored_url.host_str() == url.host_str());
            !(same_host && cookie_name(&stored.set_cookie) == Some(name))
        });
        accepted.push(StoredCookie {
            url: url.to_string(),
            set_cookie: set_cookie.to_string(),
        });
        debug!(cookie = name, host = url.host_str().unwrap_or(""), "cookie stored");
    }

    fn lock_accepted(&self) -> MutexGuard<'_, Vec<StoredCookie>> {
        self.accepted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for PersistentJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            match header.to_str() {
                Ok(set_cookie) => self.accept(set_cookie, url),
                Err(_) => warn!("ignoring non-ASCII set-cookie header"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

/// `name` from `name=value; attrs`.
fn cookie_name(set_cookie: &str) -> Option<&str> {
    let (name, _) = set_cookie.split(';').next()?.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}
