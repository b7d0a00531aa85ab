//! Request relay to the upstream service
//!
//! Replays one client request against the upstream under a pooled session's
//! token and hands the raw answer back. The relay itself never touches pool
//! state: callers feed the upstream status through `classify_status` and
//! apply the resulting `ResponseClass` to the session they hold.

pub mod classify;
pub mod error;
pub mod forward;
pub mod headers;

pub use classify::{ResponseClass, classify_status};
pub use error::{Error, Result};
pub use forward::{Relay, UpstreamResponse};
pub use headers::{AUTH_TOKEN_HEADER, client_response_headers, upstream_request_headers};
