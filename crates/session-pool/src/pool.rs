//! Round-robin session scheduler
//!
//! One mutex guards the session vector and the rotation cursor. It is held
//! only for the scan in `acquire()` and for single-field updates made through
//! a lease, never across an upstream call. The `in_use` flag is what keeps a
//! session exclusive for the duration of a request.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::Credential;
use tokio::time::Instant;
use tracing::{debug, info};
use upstream_auth::Authenticator;

use crate::lease::SessionLease;
use crate::session::{Session, SessionStatus};

pub(crate) struct PoolState {
    pub(crate) sessions: Vec<Session>,
    /// Index the next scan starts from.
    cursor: usize,
}

/// Session counts by status at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCounts {
    pub total: usize,
    pub available: usize,
    pub in_use: usize,
    pub throttled: usize,
}

impl PoolCounts {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "sessions_total": self.total,
            "sessions_available": self.available,
            "sessions_in_use": self.in_use,
            "sessions_throttled": self.throttled,
        })
    }
}

/// Fixed pool of upstream sessions.
///
/// Built once from the ordered credential list; sessions are never added or
/// removed afterwards.
pub struct SessionPool {
    state: Mutex<PoolState>,
    throttle_pause: Duration,
    authenticator: Arc<dyn Authenticator>,
}

impl SessionPool {
    /// Create a pool with one logged-out session per credential, in order.
    pub fn new(
        credentials: Vec<Credential>,
        throttle_pause: Duration,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let sessions: Vec<Session> = credentials.into_iter().map(Session::new).collect();
        info!(
            sessions = sessions.len(),
            throttle_secs = throttle_pause.as_secs(),
            "session pool initialized"
        );
        Self {
            state: Mutex::new(PoolState {
                sessions,
                cursor: 0,
            }),
            throttle_pause,
            authenticator,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cooldown applied to a session after an upstream 429.
    pub fn throttle_pause(&self) -> Duration {
        self.throttle_pause
    }

    pub(crate) fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    /// Lock the pool state. A poisoned lock is recovered: every update under
    /// it is a single field write, so the data is consistent either way.
    pub(crate) fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lease the next usable session, or `None` if every session is in use
    /// or cooling down.
    ///
    /// Scans each session once, starting at the cursor and wrapping around.
    /// The first session that is not in use and not throttled has its expired
    /// cooldown cleared, is marked in use, and the cursor moves just past it.
    /// Never waits.
    pub fn acquire(&self) -> Option<SessionLease<'_>> {
        let now = Instant::now();
        let mut state = self.lock();
        let n = state.sessions.len();
        let start = state.cursor;

        for offset in 0..n {
            let idx = (start + offset) % n;
            let session = &mut state.sessions[idx];
            if session.in_use || session.is_throttled(now) {
                continue;
            }
            session.throttled_until = None;
            session.in_use = true;
            let username = session.credential.username().to_string();
            state.cursor = (idx + 1) % n;
            debug!(account = %username, index = idx, "session acquired");
            return Some(SessionLease::new(self, idx, username));
        }

        metrics::counter!("pool_exhausted_total").increment(1);
        debug!(sessions = n, "no free session");
        None
    }

    /// Return a session to rotation. Called only from `SessionLease::drop`.
    pub(crate) fn release(&self, index: usize) {
        let mut state = self.lock();
        if let Some(session) = state.sessions.get_mut(index) {
            session.in_use = false;
            debug!(account = session.credential.username(), "session released");
        }
    }

    /// Count sessions by status.
    pub fn counts(&self) -> PoolCounts {
        let now = Instant::now();
        let state = self.lock();
        let mut counts = PoolCounts {
            total: state.sessions.len(),
            available: 0,
            in_use: 0,
            throttled: 0,
        };
        for session in &state.sessions {
            match session.status(now) {
                SessionStatus::Available => counts.available += 1,
                SessionStatus::InUse => counts.in_use += 1,
                SessionStatus::Throttled { .. } => counts.throttled += 1,
            }
        }
        counts
    }

    /// Pool health summary for the health endpoint.
    ///
    /// Status mapping: nothing throttled → healthy, some throttled →
    /// degraded, everything throttled (or no sessions) → unhealthy.
    pub fn health(&self) -> serde_json::Value {
        let now = Instant::now();
        let state = self.lock();

        let mut throttled = 0usize;
        let mut available = 0usize;
        let mut in_use = 0usize;
        let mut sessions = Vec::with_capacity(state.sessions.len());

        for session in &state.sessions {
            let status = session.status(now);
            let mut entry = serde_json::json!({
                "username": session.credential.username(),
                "status": status.label(),
                "logged_in": session.token.is_some(),
            });
            match status {
                SessionStatus::Available => available += 1,
                SessionStatus::InUse => in_use += 1,
                SessionStatus::Throttled { remaining } => {
                    throttled += 1;
                    entry["throttle_remaining_secs"] = remaining.as_secs().into();
                }
            }
            sessions.push(entry);
        }

        let total = state.sessions.len();
        let pool_status = if total == 0 || throttled == total {
            "unhealthy"
        } else if throttled > 0 {
            "degraded"
        } else {
            "healthy"
        };

        serde_json::json!({
            "status": pool_status,
            "sessions_total": total,
            "sessions_available": available,
            "sessions_in_use": in_use,
            "sessions_throttled": throttled,
            "sessions": sessions,
        })
    }
}
