//! TCP serving loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use telefs_proto::{Vfs, VfsDispatcher};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Accept loop for one listening socket.
///
/// Each accepted connection gets its own session task. Cancelling the
/// shutdown token stops the accept loop and tears down every live session,
/// which the connected peers observe as connection loss.
pub struct VfsServer {
    listener: TcpListener,
    shutdown: CancellationToken,
}

impl VfsServer {
    /// Bind to `addr` (`host:port`; port 0 picks a free one).
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the server (and kills live sessions) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve `vfs` until the shutdown token is cancelled.
    pub async fn run<V: Vfs>(self, vfs: Arc<V>) -> io::Result<()> {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    debug!("server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted?;
                    debug!(%peer, "accepted connection");
                    let dispatcher = Arc::new(VfsDispatcher::new(Arc::clone(&vfs)));
                    let session_shutdown = self.shutdown.child_token();
                    tokio::spawn(async move {
                        match telefs_rpc::accept(socket, dispatcher).await {
                            Ok(driver) => {
                                tokio::select! {
                                    () = session_shutdown.cancelled() => {
                                        debug!(%peer, "session cancelled by shutdown");
                                    }
                                    result = driver.run() => {
                                        if let Err(e) = result {
                                            warn!(%peer, error = %e, "session ended with error");
                                        } else {
                                            debug!(%peer, "session closed");
                                        }
                                    }
                                }
                            }
                            Err(e) => warn!(%peer, error = %e, "handshake failed"),
                        }
                    });
                }
            }
        }
    }
}
