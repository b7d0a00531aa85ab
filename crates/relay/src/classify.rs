//! Upstream status classification
//!
//! Maps an upstream HTTP status to the bookkeeping the serving session needs.
//! The response itself is always relayed unchanged; only session state reacts.

/// What an upstream answer means for the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// Status below 400, nothing to record.
    Success,
    /// 429: the account is rate limited and must cool down.
    RateLimited,
    /// 404: a legitimate answer, not a credential problem.
    NotFound,
    /// Any other status >= 400: the token may be stale, log in again next time.
    Failure,
}

impl ResponseClass {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseClass::Success => "success",
            ResponseClass::RateLimited => "rate_limited",
            ResponseClass::NotFound => "not_found",
            ResponseClass::Failure => "failure",
        }
    }
}

/// Classify an upstream response status.
pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        0..=399 => ResponseClass::Success,
        429 => ResponseClass::RateLimited,
        404 => ResponseClass::NotFound,
        _ => ResponseClass::Failure,
    }
}
