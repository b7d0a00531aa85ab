//! Forwarding one client request to the upstream

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::headers::{client_response_headers, upstream_request_headers};

/// Raw upstream answer, with headers already filtered for the client.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Replays client requests against a fixed upstream base URL.
#[derive(Clone)]
pub struct Relay {
    client: reqwest::Client,
    upstream_url: String,
}

impl Relay {
    /// `client` should carry the configured request timeout.
    pub fn new(client: reqwest::Client, upstream_url: impl Into<String>) -> Self {
        Self {
            client,
            upstream_url: upstream_url.into(),
        }
    }

    /// Send the client's method, path, headers and body upstream under `token`.
    ///
    /// `path_and_query` is appended verbatim to the upstream base URL. Error
    /// statuses are returned as responses; only transport failures are `Err`.
    #[instrument(skip_all, fields(method = %method, path = %path_and_query))]
    pub async fn forward(
        &self,
        token: &str,
        method: Method,
        path_and_query: &str,
        client_headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        let url = format!("{}{path_and_query}", self.upstream_url.trim_end_matches('/'));
        let headers = upstream_request_headers(client_headers, token)?;

        debug!(url = %url, body_len = body.len(), "sending request to upstream");
        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = client_response_headers(response.headers());
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), body_len = body.len(), "upstream response received");

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
