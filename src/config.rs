//! CLI configuration. Nothing here grows the CLI past the enumerated
//! option table below.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    Tcp,
    Udp,
    Both,
}

#[derive(Debug, Parser)]
#[command(name = "cached-dns-resolver", about = "Caching, iterative DNS resolver")]
pub struct Config {
    /// Logger verbosity threshold, passed straight to `tracing_subscriber`'s
    /// `EnvFilter` (e.g. "info", "debug", "cached_dns_resolver=trace").
    #[arg(long, default_value_t = default_logging_level())]
    pub logging_level: String,

    /// Which listener(s) to start.
    #[arg(long, value_enum, default_value_t = Protocol::Both)]
    pub protocol: Protocol,

    /// Bind address for listeners.
    #[arg(long, default_value_t = default_host())]
    pub host: String,

    /// Bind port for listeners.
    #[arg(long, default_value_t = default_port())]
    pub port: u16,

    /// IP addresses of root name servers, used when no cached delegation
    /// matches. Repeat the flag to supply more than one.
    #[arg(long = "root-servers", action = clap::ArgAction::Append, default_values_t = default_root_servers())]
    pub root_servers: Vec<IpAddr>,

    /// Filesystem path for the cache store.
    #[arg(long, default_value_os_t = default_cache_location())]
    pub cache_location: PathBuf,
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    53
}

/// The IANA root servers a.root-servers.net through c.root-servers.net,
/// enough to bootstrap resolution before the cache has any delegations.
fn default_root_servers() -> Vec<IpAddr> {
    vec![
        "198.41.0.4".parse().unwrap(),
        "192.228.79.201".parse().unwrap(),
        "192.33.4.12".parse().unwrap(),
    ]
}

fn default_cache_location() -> PathBuf {
    PathBuf::from("dns_cache.sqlite3")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_args() {
        let config = Config::parse_from(["cached-dns-resolver"]);
        assert_eq!(config.port, 53);
        assert_eq!(config.protocol, Protocol::Both);
        assert_eq!(config.root_servers.len(), 3);
    }

    #[test]
    fn repeated_root_servers_flag_appends() {
        let config = Config::parse_from([
            "cached-dns-resolver",
            "--root-servers",
            "10.0.0.1",
            "--root-servers",
            "10.0.0.2",
        ]);
        assert_eq!(
            config.root_servers,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "10.0.0.2".parse::<IpAddr>().unwrap(),
            ]
        );
    }
}
