//! Scripted transport for client and coordinator tests

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Notify;
use transport::{OutgoingRequest, Transport, TransportError, TransportResponse};

type Scripted = transport::Result<TransportResponse>;

/// Answers requests from per-route queues keyed by `"METHOD /path"` and logs
/// each send as `"METHOD /path"` or `"METHOD /path (token)"`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    log: Mutex<Vec<String>>,
    sent: Mutex<Vec<OutgoingRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, route: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(response);
    }

    /// Queue a response that is only delivered after `release` is notified.
    /// The hold applies to the next send on `route` only.
    pub(crate) fn push_held(&self, route: &str, response: Scripted, release: Arc<Notify>) {
        self.push(route, response);
        self.holds
            .lock()
            .unwrap()
            .insert(route.to_string(), release);
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<OutgoingRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: &'a OutgoingRequest,
    ) -> Pin<Box<dyn Future<Output = transport::Result<TransportResponse>> + Send + 'a>> {
        Box::pin(async move {
            let route = format!("{} {}", request.method, request.path());
            let entry = match request.bearer() {
                Some(token) => format!("{route} ({token})"),
                None => route.clone(),
            };
            self.log.lock().unwrap().push(entry);
            self.sent.lock().unwrap().push(request.clone());

            let hold = self.holds.lock().unwrap().remove(&route);
            if let Some(release) = hold {
                release.notified().await;
            }

            let next = self
                .routes
                .lock()
                .unwrap()
                .get_mut(&route)
                .and_then(VecDeque::pop_front);
            next.unwrap_or_else(|| {
                Err(TransportError::Request(format!(
                    "no scripted response for {route}"
                )))
            })
        })
    }
}

pub(crate) fn status(code: StatusCode) -> Scripted {
    Ok(TransportResponse::new(code, HeaderMap::new(), Vec::new()))
}

pub(crate) fn json(code: StatusCode, body: serde_json::Value) -> Scripted {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    Ok(TransportResponse::new(code, headers, body.to_string().into_bytes()))
}

/// 200 with a rotated token header.
pub(crate) fn json_with_token(body: serde_json::Value, token: &str) -> Scripted {
    let mut response = json(StatusCode::OK, body)?;
    response
        .headers
        .insert("x-access-token", HeaderValue::from_str(token).unwrap());
    Ok(response)
}

/// Well-formed refresh response rotating to `token`.
pub(crate) fn refresh_ok(token: &str) -> Scripted {
    json_with_token(
        serde_json::json!({"user": {"id": 7, "email": "ana@example.com"}}),
        token,
    )
}

pub(crate) fn network(err: TransportError) -> Scripted {
    Err(err)
}
