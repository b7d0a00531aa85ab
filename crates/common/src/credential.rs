//! Username/password pairs for the client side and the upstream pool

use std::fmt;

use crate::Secret;

/// Immutable username/password pair.
///
/// The password never shows up in `Debug` output; only the username is
/// meant to be logged.
#[derive(Clone)]
pub struct Credential {
    username: String,
    password: Secret<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plaintext password, for building upstream login bodies.
    pub fn password(&self) -> &str {
        self.password.expose()
    }

    /// True when both halves equal the candidate pair.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        // Evaluate both sides so a wrong username costs the same as a wrong password.
        let user_ok = Secret::from(self.username.as_str()).matches(username);
        let pwd_ok = self.password.matches(password);
        user_ok & pwd_ok
    }

    /// The `usr:pwd` form used as the client-facing static token.
    pub fn joined(&self) -> Secret<String> {
        Secret::new(format!("{}:{}", self.username, self.password.expose()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &self.password)
            .finish()
    }
}
