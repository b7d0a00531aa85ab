//! Per-request error types
//!
//! Every way a proxied request can fail without an upstream answer maps to
//! one `ProxyError` variant, rendered as `{"error": "<message>"}` with the
//! matching status. Upstream error statuses are not `ProxyError`s; they are
//! relayed to the client unchanged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use session_pool::PoolCounts;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid token")]
    InvalidToken,

    #[error("invalid usr or pwd")]
    InvalidLogin,

    #[error("invalid login body: {0}")]
    InvalidLoginBody(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("no upstream session available")]
    PoolExhausted(PoolCounts),

    #[error("upstream login failed: {0}")]
    Login(#[from] upstream_auth::Error),

    #[error("{0}")]
    Relay(#[from] relay::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidToken | ProxyError::InvalidLogin => StatusCode::FORBIDDEN,
            ProxyError::InvalidLoginBody(_) | ProxyError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::PoolExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Login(_) | ProxyError::Relay(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Label for the upstream error counter, for failures involving the upstream.
    pub fn upstream_error_type(&self) -> Option<&'static str> {
        match self {
            ProxyError::Login(_) => Some("login"),
            ProxyError::Relay(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({ "error": self.to_string() });
        if let ProxyError::PoolExhausted(counts) = &self {
            body["pool"] = counts.to_json();
        }
        (
            self.status(),
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_token_is_403_with_fixed_message() {
        let resp = ProxyError::InvalidToken.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"error": "invalid token"})
        );
    }

    #[tokio::test]
    async fn pool_exhausted_is_503_with_counts() {
        let counts = PoolCounts {
            total: 2,
            available: 0,
            in_use: 1,
            throttled: 1,
        };
        let resp = ProxyError::PoolExhausted(counts).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "no upstream session available");
        assert_eq!(json["pool"]["sessions_throttled"], 1);
        assert_eq!(json["pool"]["sessions_in_use"], 1);
    }

    #[test]
    fn upstream_failures_are_500() {
        let login = ProxyError::Login(upstream_auth::Error::Http("refused".into()));
        assert_eq!(login.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(login.upstream_error_type(), Some("login"));

        let relay = ProxyError::Relay(relay::Error::Timeout("60s".into()));
        assert_eq!(relay.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(relay.upstream_error_type(), Some("timeout"));
        assert_eq!(relay.to_string(), "upstream timeout: 60s");
    }

    #[test]
    fn client_errors_have_no_upstream_label() {
        assert_eq!(ProxyError::InvalidLogin.status(), StatusCode::FORBIDDEN);
        assert!(ProxyError::InvalidLogin.upstream_error_type().is_none());
        assert_eq!(
            ProxyError::InvalidLoginBody("eof".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
