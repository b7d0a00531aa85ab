//! Command-line flags
//!
//! Flags override the config file. Credentials are deliberately not flags:
//! they come from the environment so they never show up in the process list.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "ari-pool-proxy")]
#[command(about = "Reverse proxy spreading client requests over a pool of upstream accounts")]
pub struct Cli {
    /// TOML config file (falls back to CONFIG_PATH, then ./ari-pool-proxy.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen_host: Option<IpAddr>,

    /// Port to listen on
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Upstream base URL
    #[arg(long)]
    pub upstream_url: Option<String>,

    /// Seconds a session sits out after an upstream 429
    #[arg(long)]
    pub throttle_secs: Option<u64>,

    /// Upstream request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_listen_flags() {
        let cli = Cli::try_parse_from([
            "ari-pool-proxy",
            "--listen-host",
            "127.0.0.1",
            "--listen-port",
            "8080",
            "--throttle-secs",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.listen_host, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(cli.listen_port, Some(8080));
        assert_eq!(cli.throttle_secs, Some(30));
        assert!(cli.config.is_none());
    }

    #[test]
    fn rejects_non_ip_listen_host() {
        let result = Cli::try_parse_from(["ari-pool-proxy", "--listen-host", "not-an-ip"]);
        assert!(result.is_err());
    }

    #[test]
    fn no_flags_is_all_none() {
        let cli = Cli::try_parse_from(["ari-pool-proxy"]).unwrap();
        assert!(cli.listen_host.is_none());
        assert!(cli.listen_port.is_none());
        assert!(cli.upstream_url.is_none());
        assert!(cli.timeout_secs.is_none());
    }
}
