//! Application location and login redirects
//!
//! The client never decides how a redirect is presented. It asks the
//! `Navigator` where the app currently is (to detect the refresh flow) and
//! tells it to go to the login route after an unrecoverable auth failure.

use std::sync::{Mutex, PoisonError};

use tracing::info;

pub trait Navigator: Send + Sync {
    /// Current application route, if known.
    fn current_location(&self) -> Option<String>;

    /// Full navigation to `path`, abandoning the current view.
    fn redirect(&self, path: &str);
}

/// Navigator that records redirects instead of performing them.
///
/// Used by the CLI (which reports the redirect to the user) and by tests.
#[derive(Default)]
pub struct RecordingNavigator {
    location: Mutex<Option<String>>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_location(&self, path: impl Into<String>) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.into());
    }

    /// Every redirect so far, oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_redirect(&self) -> Option<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> Option<String> {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect(&self, path: &str) {
        info!(path, "redirecting to login");
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        self.set_location(path);
    }
}
