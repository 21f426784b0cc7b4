pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod packet;
pub mod records;
pub mod resolver;
pub mod server;
pub mod upstream;

use tokio::sync::{mpsc, oneshot};

use resolver::Resolver;

/// One client query plus the reply channel the resolver answers on — an
/// `ask()`-style request/reply pair carried over a channel instead of an
/// actor mailbox.
struct ResolveRequest {
    bytes: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

/// Cloneable handle listeners use to reach the resolver task. Cloning only
/// clones the `mpsc::Sender`; the resolver itself is never shared.
#[derive(Clone)]
pub struct ResolverHandle {
    sender: mpsc::Sender<ResolveRequest>,
}

impl ResolverHandle {
    /// Send `bytes` to the resolver and wait for its reply. Returns an
    /// empty response if the resolver task has already shut down.
    pub async fn resolve(&self, bytes: Vec<u8>) -> Vec<u8> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .sender
            .send(ResolveRequest {
                bytes,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// Spawn the resolver as its own task owning the request mailbox. This is
/// what makes the resolver a serial executor: only one `resolve()` call is
/// ever in flight, so the cache needs no locking beyond its own connection
/// mutex.
pub fn spawn_resolver(resolver: Resolver) -> (ResolverHandle, tokio::task::JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<ResolveRequest>(256);

    let join_handle = tokio::spawn(async move {
        while let Some(request) = receiver.recv().await {
            let response = resolver.resolve(&request.bytes).await;
            let _ = request.reply.send(response);
        }
    });

    (ResolverHandle { sender }, join_handle)
}
