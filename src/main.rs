use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use cached_dns_resolver::cache::Cache;
use cached_dns_resolver::config::{Config, Protocol};
use cached_dns_resolver::resolver::Resolver;
use cached_dns_resolver::{logging, server, spawn_resolver};

#[tokio::main]
async fn main() {
    let config = Config::parse();
    logging::init(&config.logging_level);

    info!(
        protocol = ?config.protocol,
        host = %config.host,
        port = config.port,
        cache = %config.cache_location.display(),
        "cached-dns-resolver starting"
    );

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, "invalid bind address");
            std::process::exit(1);
        }
    };

    let udp_socket = if matches!(config.protocol, Protocol::Udp | Protocol::Both) {
        Some(bind_or_exit(server::bind_udp(addr).await))
    } else {
        None
    };
    let tcp_listener = if matches!(config.protocol, Protocol::Tcp | Protocol::Both) {
        Some(bind_or_exit(server::bind_tcp(addr).await))
    } else {
        None
    };

    let cache = Arc::new(Cache::new(config.cache_location.to_string_lossy().into_owned()));
    let resolver = Resolver::new(cache, config.root_servers.clone());
    let (handle, _resolver_task) = spawn_resolver(resolver);

    if let Some(socket) = udp_socket {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = server::serve_udp(socket, handle).await {
                error!(error = %err, "UDP listener exited");
            }
        });
    }
    if let Some(listener) = tcp_listener {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = server::serve_tcp(listener, handle).await {
                error!(error = %err, "TCP listener exited");
            }
        });
    }

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, exiting");
}

fn bind_or_exit<T>(result: anyhow::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "fatal startup error");
            std::process::exit(1);
        }
    }
}
