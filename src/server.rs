//! UDP and TCP listener tasks. Each is a standalone worker with its own
//! socket; neither ever resolves a query itself — both hand the raw bytes
//! to the resolver's actor channel and wait for the reply.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::packet;
use crate::ResolverHandle;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_UDP_RESPONSE: usize = 512;
const UDP_RECV_BUFFER: usize = 65536;

/// Bind a UDP socket at `addr`. Kept separate from [`serve_udp`] so a bind
/// failure at startup is a synchronous, fatal error in `main` rather than
/// something discovered inside a spawned task.
pub async fn bind_udp(addr: SocketAddr) -> Result<UdpSocket> {
    UdpSocket::bind(addr)
        .await
        .with_context(|| format!("failed to bind UDP listener on {}", addr))
}

/// Serve forever on an already-bound UDP socket. A blank read or send
/// error is logged and the loop continues; this never returns.
pub async fn serve_udp(socket: UdpSocket, resolver: ResolverHandle) -> Result<()> {
    info!(addr = ?socket.local_addr().ok(), "UDP listener started");

    let mut buf = vec![0u8; UDP_RECV_BUFFER];
    loop {
        let (len, client) = match timeout(SOCKET_TIMEOUT, socket.recv_from(&mut buf)).await {
            Ok(Ok(r)) => r,
            Ok(Err(err)) => {
                warn!(error = %err, "UDP recv error");
                continue;
            }
            Err(_) => continue, // silent timeout, try again
        };

        let query = buf[..len].to_vec();
        let mut response = resolver.resolve(query).await;
        if response.len() > MAX_UDP_RESPONSE {
            match packet::truncate_for_udp(&response, MAX_UDP_RESPONSE) {
                Ok(truncated) => response = truncated,
                Err(err) => {
                    warn!(error = %err, "failed to truncate oversized response, dropping");
                    continue;
                }
            }
        }

        if let Err(err) = socket.send_to(&response, client).await {
            debug!(%client, error = %err, "UDP send error");
        }
    }
}

/// Bind a TCP listener at `addr`. Kept separate from [`serve_tcp`] for the
/// same reason as [`bind_udp`]: bind failures should be fatal and
/// synchronous at startup.
pub async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind TCP listener on {}", addr))
}

/// Serve forever on an already-bound TCP listener, one exchange per
/// accepted connection.
pub async fn serve_tcp(listener: TcpListener, resolver: ResolverHandle) -> Result<()> {
    info!(addr = ?listener.local_addr().ok(), "TCP listener started");

    loop {
        let (stream, client) = match timeout(SOCKET_TIMEOUT, listener.accept()).await {
            Ok(Ok(r)) => r,
            Ok(Err(err)) => {
                warn!(error = %err, "TCP accept error");
                continue;
            }
            Err(_) => continue, // silent timeout, try again
        };

        let resolver = resolver.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_tcp_connection(stream, resolver).await {
                debug!(%client, error = %err, "TCP connection error");
            }
        });
    }
}

async fn handle_tcp_connection(mut stream: tokio::net::TcpStream, resolver: ResolverHandle) -> Result<()> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let msg_len = u16::from_be_bytes(len_buf) as usize;

    let mut query_buf = vec![0u8; msg_len];
    stream.read_exact(&mut query_buf).await?;

    let response = resolver.resolve(query_buf).await;

    let len_prefix = (response.len() as u16).to_be_bytes();
    stream.write_all(&len_prefix).await?;
    stream.write_all(&response).await?;
    Ok(())
}
