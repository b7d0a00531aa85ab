//! Upstream login call
//!
//! POSTs the account's username and password as JSON to `LOGIN_PATH`,
//! forwarding the caller's User-Agent. The upstream answers with a JSON
//! object whose `token` field authorizes later requests for that account.

use common::Credential;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::LOGIN_PATH;
use crate::error::{Error, Result};

/// Login request body. Not `Debug`: it carries the plaintext password.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub usr: &'a str,
    pub pwd: &'a str,
}

/// Successful login answer. Extra fields sent by the upstream are ignored.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Log in one upstream account and return its token.
///
/// `user_agent` is the inbound client's User-Agent; the header is omitted
/// when the client did not send one. Any non-2xx status, or a 2xx body
/// without a non-empty `token`, is an error.
pub async fn login(
    client: &reqwest::Client,
    upstream_url: &str,
    credential: &Credential,
    user_agent: Option<&str>,
) -> Result<String> {
    let url = format!("{}{LOGIN_PATH}", upstream_url.trim_end_matches('/'));
    let mut request = client.post(&url).json(&LoginRequest {
        usr: credential.username(),
        pwd: credential.password(),
    });
    if let Some(ua) = user_agent {
        request = request.header(reqwest::header::USER_AGENT, ua);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    debug!(
        account = credential.username(),
        status = status.as_u16(),
        "login response received"
    );

    if !status.is_success() {
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: LoginResponse = serde_json::from_str(&body)
        .map_err(|e| Error::InvalidResponse(format!("{e}: {body}")))?;
    if parsed.token.is_empty() {
        return Err(Error::InvalidResponse("empty token".into()));
    }
    Ok(parsed.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use tokio::net::TcpListener;

    /// Start a mock upstream whose login route is served by `handler`.
    async fn start_login_server<H, T>(handler: H) -> String
    where
        H: axum::handler::Handler<T, ()>,
        T: 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(LOGIN_PATH, post(handler));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn login_request_serializes_usr_and_pwd() {
        let body = LoginRequest {
            usr: "alice",
            pwd: "s3cret",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"usr": "alice", "pwd": "s3cret"}));
    }

    #[test]
    fn login_response_ignores_extra_fields() {
        let parsed: LoginResponse =
            serde_json::from_str(r#"{"token":"abc","expires":123}"#).unwrap();
        assert_eq!(parsed.token, "abc");
    }

    #[tokio::test]
    async fn login_returns_token_and_forwards_user_agent() {
        let url = start_login_server(
            |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let ua = headers
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                let usr = body["usr"].as_str().unwrap_or_default();
                let pwd = body["pwd"].as_str().unwrap_or_default();
                let token = format!("tok-{usr}-{pwd}-{ua}");
                Json(serde_json::json!({ "token": token }))
            },
        )
        .await;

        let cred = Credential::new("alice", "s3cret");
        let token = login(&reqwest::Client::new(), &url, &cred, Some("ThermoApp/1.0"))
            .await
            .unwrap();
        assert_eq!(token, "tok-alice-s3cret-ThermoApp/1.0");
    }

    #[tokio::test]
    async fn login_trailing_slash_in_upstream_url() {
        let url = start_login_server(|| async { Json(serde_json::json!({"token": "t"})) }).await;
        let cred = Credential::new("alice", "s3cret");
        let token = login(&reqwest::Client::new(), &format!("{url}/"), &cred, None)
            .await
            .unwrap();
        assert_eq!(token, "t");
    }

    #[tokio::test]
    async fn login_non_success_is_rejected() {
        let url = start_login_server(|| async {
            (StatusCode::UNAUTHORIZED, "bad credentials").into_response()
        })
        .await;
        let cred = Credential::new("alice", "wrong");
        let err = login(&reqwest::Client::new(), &url, &cred, None)
            .await
            .unwrap_err();
        match err {
            Error::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_missing_token_is_invalid_response() {
        let url =
            start_login_server(|| async { Json(serde_json::json!({"status": "ok"})) }).await;
        let cred = Credential::new("alice", "s3cret");
        let err = login(&reqwest::Client::new(), &url, &cred, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn login_empty_token_is_invalid_response() {
        let url = start_login_server(|| async { Json(serde_json::json!({"token": ""})) }).await;
        let cred = Credential::new("alice", "s3cret");
        let err = login(&reqwest::Client::new(), &url, &cred, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn login_unreachable_upstream_is_http_error() {
        let cred = Credential::new("alice", "s3cret");
        let err = login(&reqwest::Client::new(), "http://127.0.0.1:1", &cred, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got {err:?}");
    }
}
