//! Per-account session state

use std::time::Duration;

use common::Credential;
use tokio::time::Instant;

/// Live state of one pooled upstream account.
///
/// Only ever read or written while holding the pool mutex.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) credential: Credential,
    /// `None` means not logged in.
    pub(crate) token: Option<String>,
    pub(crate) in_use: bool,
    pub(crate) throttled_until: Option<Instant>,
}

impl Session {
    pub(crate) fn new(credential: Credential) -> Self {
        Self {
            credential,
            token: None,
            in_use: false,
            throttled_until: None,
        }
    }

    pub(crate) fn is_throttled(&self, now: Instant) -> bool {
        self.throttled_until.is_some_and(|until| now < until)
    }

    pub(crate) fn status(&self, now: Instant) -> SessionStatus {
        match self.throttled_until {
            Some(until) if now < until => SessionStatus::Throttled {
                remaining: until - now,
            },
            _ if self.in_use => SessionStatus::InUse,
            _ => SessionStatus::Available,
        }
    }
}

/// Externally visible session status, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionStatus {
    Available,
    InUse,
    Throttled { remaining: Duration },
}

impl SessionStatus {
    /// Status label for health/logging.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            SessionStatus::Available => "available",
            SessionStatus::InUse => "in_use",
            SessionStatus::Throttled { .. } => "throttled",
        }
    }
}
