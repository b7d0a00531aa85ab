//! Header filtering for both directions of the relay
//!
//! Inbound: drop connection-specific headers and the client's own
//! `ar.authtoken`, then inject the session token. Outbound: drop headers the
//! front door recomputes (length, connection, date).

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// Header carrying the token, both from client to proxy and proxy to upstream.
pub const AUTH_TOKEN_HEADER: &str = "ar.authtoken";

/// Headers to strip before forwarding (hop-by-hop per RFC 2616 Section 13.5.1)
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Client request headers never copied upstream.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "content-encoding",
    "transfer-encoding",
    AUTH_TOKEN_HEADER,
];

/// Upstream response headers the front door regenerates.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &["content-length", "connection", "date"];

/// Check if a header is hop-by-hop (should be stripped before forwarding)
pub(crate) fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

fn listed(list: &[&str], name: &str) -> bool {
    list.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Build the upstream request headers from the client's, with `token`
/// injected as `ar.authtoken`. Repeated client headers keep every value.
pub fn upstream_request_headers(client: &HeaderMap, token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(client.len() + 1);
    for (name, value) in client {
        if is_hop_by_hop(name.as_str()) || listed(STRIPPED_REQUEST_HEADERS, name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    let value = HeaderValue::from_str(token).map_err(|_| Error::InvalidToken)?;
    headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), value);
    Ok(headers)
}

/// Filter upstream response headers for the client.
pub fn client_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name.as_str()) || listed(STRIPPED_RESPONSE_HEADERS, name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}
