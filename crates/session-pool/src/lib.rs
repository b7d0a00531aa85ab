//! Session pool for upstream accounts
//!
//! Holds one `Session` per configured upstream credential and hands them out
//! round-robin, one request at a time. A session is leased, logged in lazily,
//! used for exactly one upstream call, then returned to rotation when the
//! lease drops.
//!
//! Session lifecycle:
//! 1. Startup builds the pool from the ordered credential list, no tokens yet
//! 2. `acquire()` scans from the cursor for a session that is neither in use
//!    nor cooling down, marks it in use, and returns a `SessionLease`
//! 3. `SessionLease::ensure_logged_in()` logs in if the session has no token
//! 4. After the upstream call, `SessionLease::record()` applies the response
//!    class: 429 starts a cooldown, other non-404 errors drop the token
//! 5. Dropping the lease releases the session on every exit path

pub mod lease;
pub mod pool;
mod session;

pub use lease::SessionLease;
pub use pool::{PoolCounts, SessionPool};
