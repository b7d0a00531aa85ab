//! Authenticator abstraction over the upstream login call
//!
//! The session pool only needs "give me a token for this credential". The
//! trait keeps that seam dyn-compatible (`Arc<dyn Authenticator>`) by
//! returning boxed futures, so tests can substitute a fake that counts calls.

use std::future::Future;
use std::pin::Pin;

use common::Credential;

use crate::error::Result;
use crate::login::login;

/// Obtains an upstream token for one pooled credential.
pub trait Authenticator: Send + Sync {
    /// Perform exactly one login attempt.
    ///
    /// `user_agent` is forwarded from the inbound client request, since the
    /// upstream may answer differently per client signature.
    fn login<'a>(
        &'a self,
        credential: &'a Credential,
        user_agent: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// HTTP authenticator that logs in against the real upstream.
pub struct UpstreamAuthenticator {
    client: reqwest::Client,
    upstream_url: String,
}

impl UpstreamAuthenticator {
    /// `client` should carry the configured request timeout.
    pub fn new(client: reqwest::Client, upstream_url: impl Into<String>) -> Self {
        Self {
            client,
            upstream_url: upstream_url.into(),
        }
    }
}

impl Authenticator for UpstreamAuthenticator {
    fn login<'a>(
        &'a self,
        credential: &'a Credential,
        user_agent: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(login(
            &self.client,
            &self.upstream_url,
            credential,
            user_agent,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::LOGIN_PATH;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn upstream_authenticator_is_usable_as_trait_object() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(
            LOGIN_PATH,
            axum::routing::post(|| async { axum::Json(serde_json::json!({"token": "tok"})) }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let auth: Arc<dyn Authenticator> = Arc::new(UpstreamAuthenticator::new(
            reqwest::Client::new(),
            format!("http://{addr}"),
        ));
        let cred = Credential::new("bob", "pw");
        assert_eq!(auth.login(&cred, None).await.unwrap(), "tok");
    }
}
