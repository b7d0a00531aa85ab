//! Upstream login for pooled sessions
//!
//! Obtains per-account tokens from the upstream's login endpoint. The pool
//! talks to this crate through the `Authenticator` trait so that scheduling
//! logic can be tested without a live upstream.
//!
//! Login flow:
//! 1. Pool hands out a session whose token is empty
//! 2. `Authenticator::login()` POSTs `{"usr","pwd"}` to `LOGIN_PATH`
//! 3. The `token` field of the JSON answer becomes the session token
//! 4. A later non-404 upstream error clears the token and the cycle repeats

pub mod authenticator;
pub mod constants;
pub mod error;
pub mod login;

pub use authenticator::{Authenticator, UpstreamAuthenticator};
pub use constants::*;
pub use error::{Error, Result};
pub use login::{LoginRequest, LoginResponse, login};
