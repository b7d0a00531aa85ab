//! Error types for upstream login

/// Errors from a single upstream login attempt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("login request failed: {0}")]
    Http(String),

    #[error("login timed out: {0}")]
    Timeout(String),

    #[error("login rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid login response: {0}")]
    InvalidResponse(String),
}

/// Result alias for login operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}
