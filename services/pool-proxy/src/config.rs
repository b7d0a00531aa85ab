//! Configuration types and loading
//!
//! Config precedence: CLI args > config file > defaults.
//! Credentials are read only from the environment (`AUTH_*`, `POOL_<n>_*`),
//! never from the TOML, so they stay out of files and the process list.

use common::Credential;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use upstream_auth::DEFAULT_UPSTREAM_URL;

use crate::cli::Cli;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "ari-pool-proxy.toml";

/// Longest cooldown accepted after an upstream 429 (one day).
const MAX_THROTTLE_SECS: u64 = 86_400;

/// Fully resolved runtime configuration
#[derive(Debug)]
pub struct Config {
    pub proxy: ProxyConfig,
    /// Credential clients must present to use the proxy
    pub client: Credential,
    /// Upstream accounts, in rotation order
    pub pool: Vec<Credential>,
}

/// On-disk config file layout
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    proxy: ProxyConfig,
}

/// HTTP proxy settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    #[serde(default = "default_throttle")]
    pub throttle_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_url: default_upstream_url(),
            throttle_secs: default_throttle(),
            timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9999))
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_throttle() -> u64 {
    180
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

impl ProxyConfig {
    /// Read the `[proxy]` table from a TOML file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&contents)?;
        Ok(file.proxy)
    }

    /// Overlay any flags given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = cli.listen_host {
            self.listen_addr.set_ip(host);
        }
        if let Some(port) = cli.listen_port {
            self.listen_addr.set_port(port);
        }
        if let Some(url) = &cli.upstream_url {
            self.upstream_url = url.clone();
        }
        if let Some(secs) = cli.throttle_secs {
            self.throttle_secs = secs;
        }
        if let Some(secs) = cli.timeout_secs {
            self.timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> common::Result<()> {
        // Validate upstream_url is a valid URL with http(s) scheme
        if !self.upstream_url.starts_with("http://") && !self.upstream_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "upstream_url must start with http:// or https://, got: {}",
                self.upstream_url
            )));
        }

        if self.throttle_secs > MAX_THROTTLE_SECS {
            return Err(common::Error::Config(format!(
                "throttle_secs must be at most {MAX_THROTTLE_SECS}, got: {}",
                self.throttle_secs
            )));
        }

        if self.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Resolve and load the proxy settings, overlay CLI flags, then read
    /// credentials from the process environment.
    pub fn load(cli: &Cli) -> common::Result<Self> {
        let mut proxy = match Self::resolve_path(cli.config.as_deref()) {
            Some(path) => ProxyConfig::from_file(&path).map_err(|e| {
                common::Error::Config(format!("failed to read {}: {e}", path.display()))
            })?,
            None => ProxyConfig::default(),
        };
        proxy.apply_cli(cli);
        proxy.validate()?;

        let (client, pool) = credentials_from_env(|key| std::env::var(key).ok())?;
        Ok(Self {
            proxy,
            client,
            pool,
        })
    }

    /// Resolve config file path from CLI arg, CONFIG_PATH env var, or the
    /// default file if present. `None` means run on defaults.
    pub fn resolve_path(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

/// Read one `<prefix>_USR` / `<prefix>_PWD` pair. Empty values count as unset.
fn credential_from_env<F>(lookup: &F, prefix: &str) -> common::Result<Credential>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |suffix: &str| {
        let key = format!("{prefix}_{suffix}");
        lookup(&key)
            .filter(|v| !v.is_empty())
            .ok_or(common::Error::MissingEnv(key))
    };
    Ok(Credential::new(get("USR")?, get("PWD")?))
}

/// Read the client credential and the ordered pool credentials.
///
/// `AUTH_USR`/`AUTH_PWD` are required. Pool entries are read as
/// `POOL_0_*`, `POOL_1_*`, ... up to the first missing `POOL_<n>_USR`; at
/// least one is required.
pub fn credentials_from_env<F>(lookup: F) -> common::Result<(Credential, Vec<Credential>)>
where
    F: Fn(&str) -> Option<String>,
{
    let client = credential_from_env(&lookup, "AUTH")?;

    let mut pool = Vec::new();
    loop {
        let prefix = format!("POOL_{}", pool.len());
        if lookup(&format!("{prefix}_USR")).is_none_or(|v| v.is_empty()) {
            break;
        }
        pool.push(credential_from_env(&lookup, &prefix)?);
    }

    if pool.is_empty() {
        return Err(common::Error::Config(
            "no credentials configured for the pool (set POOL_0_USR / POOL_0_PWD)".into(),
        ));
    }
    Ok((client, pool))
}
