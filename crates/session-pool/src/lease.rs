//! Scoped ownership of one pooled session
//!
//! A `SessionLease` is the only way to touch a session after `acquire()`.
//! Dropping it releases the session, so early returns, `?` and panics all
//! put the session back into rotation.

use std::time::Duration;

use relay::ResponseClass;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::pool::SessionPool;

/// Cooldown deadline used when `now + pause` is past what `Instant` can hold.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Exclusive hold on one session for the duration of a request.
pub struct SessionLease<'a> {
    pool: &'a SessionPool,
    index: usize,
    username: String,
}

impl<'a> SessionLease<'a> {
    pub(crate) fn new(pool: &'a SessionPool, index: usize, username: String) -> Self {
        Self {
            pool,
            index,
            username,
        }
    }

    /// Upstream username of the leased session.
    pub fn username(&self) -> &str {
        &self.username
    }

    #[cfg(test)]
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    #[cfg(test)]
    pub(crate) fn token(&self) -> Option<String> {
        self.pool.lock().sessions[self.index].token.clone()
    }

    /// Return the session token, logging in first if there is none.
    ///
    /// A stored token is reused without contacting the upstream. Otherwise one
    /// login attempt is made with `user_agent` forwarded; on failure the token
    /// stays empty so the next lease of this session tries again. A failed
    /// login does not throttle the session.
    pub async fn ensure_logged_in(
        &self,
        user_agent: Option<&str>,
    ) -> upstream_auth::Result<String> {
        let credential = {
            let state = self.pool.lock();
            let session = &state.sessions[self.index];
            if let Some(token) = &session.token {
                return Ok(token.clone());
            }
            session.credential.clone()
        };

        info!(account = %self.username, "logging in to upstream");
        match self.pool.authenticator().login(&credential, user_agent).await {
            Ok(token) => {
                metrics::counter!("pool_logins_total", "outcome" => "success").increment(1);
                self.pool.lock().sessions[self.index].token = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                metrics::counter!("pool_logins_total", "outcome" => "failure").increment(1);
                warn!(account = %self.username, error = %e, "upstream login failed");
                Err(e)
            }
        }
    }

    /// Apply the classification of the upstream answer to this session.
    ///
    /// - RateLimited → unselectable until now + throttle pause
    /// - Failure → token dropped, next lease logs in again
    /// - Success / NotFound → no change
    pub fn record(&self, class: ResponseClass) {
        match class {
            ResponseClass::RateLimited => {
                let pause = self.pool.throttle_pause();
                let now = Instant::now();
                let until = now
                    .checked_add(pause)
                    .unwrap_or_else(|| now + FAR_FUTURE);
                self.pool.lock().sessions[self.index].throttled_until = Some(until);
                metrics::counter!("pool_throttled_total").increment(1);
                info!(
                    account = %self.username,
                    throttle_secs = pause.as_secs(),
                    "session throttled by upstream"
                );
            }
            ResponseClass::Failure => {
                self.pool.lock().sessions[self.index].token = None;
                metrics::counter!("pool_token_invalidations_total").increment(1);
                info!(account = %self.username, "upstream error, token dropped");
            }
            ResponseClass::Success | ResponseClass::NotFound => {
                debug!(account = %self.username, class = class.label(), "no session change");
            }
        }
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::tests::test_pool;
    use relay::ResponseClass;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn first_lease_logs_in_and_stores_token() {
        let (pool, auth) = test_pool(&["a"], Duration::from_secs(180));
        let lease = pool.acquire().unwrap();
        assert!(lease.token().is_none());

        let token = lease.ensure_logged_in(Some("ThermoApp/1.0")).await.unwrap();
        assert_eq!(token, "tok-a-1");
        assert_eq!(lease.token().as_deref(), Some("tok-a-1"));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn login_skipped_when_token_present() {
        let (pool, auth) = test_pool(&["a"], Duration::from_secs(180));
        {
            let lease = pool.acquire().unwrap();
            lease.ensure_logged_in(None).await.unwrap();
        }

        let lease = pool.acquire().unwrap();
        let token = lease.ensure_logged_in(None).await.unwrap();
        assert_eq!(token, "tok-a-1");
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1, "no second login");
    }

    #[tokio::test]
    async fn failure_class_forces_relogin_on_next_lease() {
        let (pool, auth) = test_pool(&["a"], Duration::from_secs(180));
        {
            let lease = pool.acquire().unwrap();
            lease.ensure_logged_in(None).await.unwrap();
            lease.record(ResponseClass::Failure);
            assert!(lease.token().is_none());
        }

        let lease = pool.acquire().unwrap();
        let token = lease.ensure_logged_in(None).await.unwrap();
        assert_eq!(token, "tok-a-2");
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_and_success_leave_session_untouched() {
        let (pool, auth) = test_pool(&["a"], Duration::from_secs(180));
        for class in [ResponseClass::NotFound, ResponseClass::Success] {
            let lease = pool.acquire().unwrap();
            lease.ensure_logged_in(None).await.unwrap();
            lease.record(class);
            assert_eq!(lease.token().as_deref(), Some("tok-a-1"));
        }
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.counts().throttled, 0);
        assert!(pool.acquire().is_some());
    }

    #[tokio::test]
    async fn failed_login_leaves_token_empty_and_releases() {
        let (pool, auth) = test_pool(&["a"], Duration::from_secs(180));
        auth.fail.store(true, Ordering::SeqCst);

        let err = {
            let lease = pool.acquire().unwrap();
            lease.ensure_logged_in(None).await.unwrap_err()
        };
        assert!(err.to_string().contains("401"));

        // released, not throttled, still logged out
        let lease = pool.acquire().expect("session back in rotation");
        assert!(lease.token().is_none());
        assert_eq!(pool.counts().throttled, 0);

        auth.fail.store(false, Ordering::SeqCst);
        assert_eq!(lease.ensure_logged_in(None).await.unwrap(), "tok-a-2");
    }

    #[tokio::test]
    async fn huge_throttle_pause_saturates_instead_of_panicking() {
        let (pool, _auth) = test_pool(&["a"], Duration::from_secs(u64::MAX));
        let lease = pool.acquire().unwrap();
        lease.record(ResponseClass::RateLimited);
        drop(lease);

        assert_eq!(pool.counts().throttled, 1);
        assert!(pool.acquire().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_keeps_token() {
        let (pool, auth) = test_pool(&["a", "b"], Duration::from_secs(30));
        let lease = pool.acquire().unwrap();
        lease.ensure_logged_in(None).await.unwrap();
        lease.record(ResponseClass::RateLimited);
        assert_eq!(lease.token().as_deref(), Some("tok-a-1"));
        drop(lease);

        tokio::time::advance(Duration::from_secs(30)).await;
        // b first (cursor), then a again without a new login
        drop(pool.acquire().unwrap());
        let lease = pool.acquire().unwrap();
        assert_eq!(lease.username(), "a");
        lease.ensure_logged_in(None).await.unwrap();
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }
}
