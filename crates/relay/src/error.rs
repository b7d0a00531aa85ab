//! Error types for relay operations

/// Errors from forwarding a request upstream.
///
/// Upstream error statuses are not errors here; they come back as a normal
/// `UpstreamResponse` and are relayed to the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("upstream request failed: {0}")]
    Http(String),

    #[error("upstream timeout: {0}")]
    Timeout(String),

    #[error("session token is not a valid header value")]
    InvalidToken,
}

impl Error {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Http(_) => "connection",
            Error::Timeout(_) => "timeout",
            Error::InvalidToken => "invalid_token",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

/// Result alias for relay operations.
pub type Result<T> = std::result::Result<T, Error>;
