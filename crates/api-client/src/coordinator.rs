//! Refresh gate
//!
//! Guarantees at most one refresh call in flight per coordinator. The gate
//! state (`is_refreshing` plus waiting subscribers) lives in this struct, not
//! in process-wide statics, so every client (and every test) gets its own.
//!
//! Gate policies for a caller arriving while a refresh is already running:
//! - `Reject` (default): return `None` immediately. The caller treats this as
//!   "no token available" and fails, even though the in-flight refresh may
//!   succeed a moment later.
//! - `Await`: subscribe and receive the in-flight refresh's result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use session_auth::{AccessToken, CredentialStore, RefreshProtocol, RefreshedSession};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use transport::Transport;

use crate::interceptor::RequestInterceptor;
use crate::navigator::Navigator;

/// What a caller does when it finds a refresh already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePolicy {
    #[default]
    Reject,
    Await,
}

type Subscriber = oneshot::Sender<Option<RefreshedSession>>;

#[derive(Default)]
struct RefreshState {
    is_refreshing: bool,
    subscribers: Vec<Subscriber>,
}

enum Gate {
    Acquired,
    Busy,
    Subscribed(oneshot::Receiver<Option<RefreshedSession>>),
}

/// Serializes refresh calls and publishes their outcome.
pub struct RefreshCoordinator {
    protocol: RefreshProtocol,
    policy: GatePolicy,
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    interceptor: Arc<RequestInterceptor>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        protocol: RefreshProtocol,
        policy: GatePolicy,
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        interceptor: Arc<RequestInterceptor>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            protocol,
            policy,
            transport,
            store,
            interceptor,
            navigator,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn protocol(&self) -> &RefreshProtocol {
        &self.protocol
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_state().is_refreshing
    }

    /// Obtain a fresh access token.
    ///
    /// `Ok(None)` means no token is available right now: the app is already
    /// on the refresh flow, or (with `Reject`) another refresh is in flight,
    /// or (with `Await`) the in-flight refresh failed.
    pub async fn refresh(&self) -> session_auth::Result<Option<AccessToken>> {
        Ok(self.refresh_session().await?.map(|s| s.access_token))
    }

    /// Like `refresh`, but keeps the session payload from the response.
    #[instrument(skip_all, fields(policy = ?self.policy))]
    pub async fn refresh_session(&self) -> session_auth::Result<Option<RefreshedSession>> {
        if self.on_refresh_flow() {
            debug!("already on the refresh flow, skipping refresh");
            crate::metrics::record_refresh("skipped");
            return Ok(None);
        }

        match self.enter() {
            Gate::Acquired => {}
            Gate::Busy => {
                debug!("refresh already in flight, not waiting for it");
                crate::metrics::record_refresh("skipped");
                return Ok(None);
            }
            Gate::Subscribed(rx) => {
                debug!("refresh already in flight, waiting for its result");
                crate::metrics::record_refresh("awaited");
                return Ok(rx.await.unwrap_or(None));
            }
        }

        let guard = SettleGuard::new(self);

        let mut request = self.protocol.build_request();
        let request_id = self.interceptor.stamp(&mut request);
        let outcome = self.protocol.refresh(self.transport.as_ref(), &request).await;

        match &outcome {
            Ok(refreshed) => {
                self.store.set(refreshed.access_token.clone()).await;
                info!(request_id, "access token refreshed");
                crate::metrics::record_refresh("success");
            }
            Err(e) => {
                warn!(request_id, error = %e, "access token refresh failed");
                crate::metrics::record_refresh(refresh_error_label(e));
            }
        }

        guard.settle(outcome.as_ref().ok().cloned());
        outcome.map(Some)
    }

    fn on_refresh_flow(&self) -> bool {
        self.navigator
            .current_location()
            .is_some_and(|location| location.contains(self.protocol.path()))
    }

    fn enter(&self) -> Gate {
        let mut state = self.lock_state();
        if !state.is_refreshing {
            state.is_refreshing = true;
            return Gate::Acquired;
        }
        match self.policy {
            GatePolicy::Reject => Gate::Busy,
            GatePolicy::Await => {
                let (tx, rx) = oneshot::channel();
                state.subscribers.push(tx);
                Gate::Subscribed(rx)
            }
        }
    }

    /// Reset the flag and hand `outcome` to every subscriber.
    fn settle(&self, outcome: Option<RefreshedSession>) {
        let subscribers = {
            let mut state = self.lock_state();
            state.is_refreshing = false;
            std::mem::take(&mut state.subscribers)
        };
        for subscriber in subscribers {
            let _ = subscriber.send(outcome.clone());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the gate even if the refresh future is dropped mid-flight.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl<'a> SettleGuard<'a> {
    fn new(coordinator: &'a RefreshCoordinator) -> Self {
        Self {
            coordinator,
            armed: true,
        }
    }

    fn settle(mut self, outcome: Option<RefreshedSession>) {
        self.armed = false;
        self.coordinator.settle(outcome);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.settle(None);
        }
    }
}

fn refresh_error_label(e: &session_auth::Error) -> &'static str {
    match e {
        session_auth::Error::Transport(_) => "network_error",
        session_auth::Error::Rejected { .. } => "rejected",
        session_auth::Error::InvalidRefreshResponse(_) => "invalid_response",
        session_auth::Error::Cache(_) => "cache_error",
    }
}
