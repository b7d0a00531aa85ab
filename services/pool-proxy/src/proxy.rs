//! Front door and relay pipeline
//!
//! Every inbound request goes through `proxy_request`:
//! 1. Paths containing `/accounts/login` are answered locally with the static
//!    client token, without touching the pool or the upstream
//! 2. Anything else must carry `ar.authtoken: <client_usr>:<client_pwd>`
//! 3. A session is leased, logged in if needed, and the request is relayed
//! 4. The upstream status is classified onto the session, the lease drops,
//!    and the upstream answer goes back to the client verbatim

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use common::{Credential, Secret};
use futures_util::FutureExt;
use relay::{AUTH_TOKEN_HEADER, Relay, classify_status};
use serde::Deserialize;
use session_pool::SessionPool;
use tracing::{error, info, instrument, warn};

use crate::error::ProxyError;

/// Substring that marks a client login request.
const LOGIN_PATH_MARKER: &str = "/accounts/login";

/// Inbound body size limit.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Runtime counters for the health endpoint and drain logging
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    /// Requests currently being processed; logged if the drain deadline hits.
    pub in_flight: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Decrements the in-flight counter on every exit path.
struct InFlight(Arc<AtomicU64>);

impl InFlight {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Shared state passed to the proxy handler via axum State extractor
#[derive(Clone)]
pub struct ProxyState {
    pub pool: Arc<SessionPool>,
    pub relay: Relay,
    client: Arc<Credential>,
    /// `<client_usr>:<client_pwd>`, expected in `ar.authtoken`
    client_token: Arc<Secret<String>>,
    pub metrics: ServiceMetrics,
}

impl ProxyState {
    pub fn new(pool: Arc<SessionPool>, relay: Relay, client: Credential) -> Self {
        let client_token = Arc::new(client.joined());
        Self {
            pool,
            relay,
            client: Arc::new(client),
            client_token,
            metrics: ServiceMetrics::new(),
        }
    }
}

/// Client login body.
#[derive(Deserialize)]
struct ClientLogin {
    usr: String,
    pwd: String,
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Handle one inbound request end to end. Never fails: every outcome is a
/// well-formed HTTP response.
#[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.uri().path()))]
pub async fn proxy_request(
    state: &ProxyState,
    request: axum::http::Request<Body>,
    request_id: String,
) -> Response {
    let started = Instant::now();
    let _in_flight = InFlight::enter(&state.metrics.in_flight);
    state
        .metrics
        .requests_total
        .fetch_add(1, Ordering::Relaxed);

    let (parts, body) = request.into_parts();
    let method = parts.method.clone();

    let result = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => dispatch(state, parts, body).await,
        Err(e) => Err(ProxyError::InvalidBody(e.to_string())),
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            if let Some(kind) = e.upstream_error_type() {
                crate::metrics::record_upstream_error(kind);
            }
            if e.status().is_server_error() {
                state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "request failed");
            } else {
                warn!(error = %e, status = e.status().as_u16(), "request rejected");
            }
            e.into_response()
        }
    };

    let status = response.status().as_u16();
    crate::metrics::record_request(status, method.as_str(), started.elapsed().as_secs_f64());
    info!(status, "response sent");
    response
}

/// Route a fully read request to the login intercept or the relay pipeline.
async fn dispatch(
    state: &ProxyState,
    parts: Parts,
    body: Bytes,
) -> Result<Response, ProxyError> {
    if parts.uri.path().contains(LOGIN_PATH_MARKER) {
        return client_login(state, &body);
    }

    if !is_authorized(state, &parts.headers) {
        crate::metrics::record_client_rejection("invalid_token");
        return Err(ProxyError::InvalidToken);
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let pipeline =
        relay_with_session(state, parts.method, path_and_query, &parts.headers, body);
    match AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ProxyError::Internal(panic_message(panic.as_ref()))),
    }
}

/// Answer a client login locally with the static client token.
fn client_login(state: &ProxyState, body: &[u8]) -> Result<Response, ProxyError> {
    let login: ClientLogin =
        serde_json::from_slice(body).map_err(|e| ProxyError::InvalidLoginBody(e.to_string()))?;
    if !state.client.matches(&login.usr, &login.pwd) {
        crate::metrics::record_client_rejection("invalid_login");
        return Err(ProxyError::InvalidLogin);
    }
    Ok(json_response(
        StatusCode::OK,
        serde_json::json!({ "token": state.client_token.expose() }),
    ))
}

fn is_authorized(state: &ProxyState, headers: &HeaderMap) -> bool {
    headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| state.client_token.matches(token))
}

/// Lease a session, log it in if needed, relay, classify, release.
///
/// The lease is dropped on every path out of this function, including
/// unwinding, which returns the session to rotation.
async fn relay_with_session(
    state: &ProxyState,
    method: Method,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let lease = state
        .pool
        .acquire()
        .ok_or_else(|| ProxyError::PoolExhausted(state.pool.counts()))?;
    info!(account = lease.username(), "session found");

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let token = lease.ensure_logged_in(user_agent).await?;

    let upstream = state
        .relay
        .forward(&token, method, path_and_query, headers, body)
        .await?;

    let class = classify_status(upstream.status.as_u16());
    lease.record(class);
    info!(
        account = lease.username(),
        upstream_status = upstream.status.as_u16(),
        class = class.label(),
        "upstream response received"
    );
    drop(lease);

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    Ok(response)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "request handler panicked".to_string()
    }
}
