//! Upstream endpoint constants

/// Upstream service the pool logs into by default.
pub const DEFAULT_UPSTREAM_URL: &str = "https://www.ariston-net.remotethermo.com";

/// Login endpoint, relative to the upstream base URL.
pub const LOGIN_PATH: &str = "/api/v2/accounts/login";
