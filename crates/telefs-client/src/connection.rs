//! Session lifecycle: connect, disconnect, and loss detection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use telefs_proto::VfsClient;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, AdapterResult};

/// What the volume can currently do, published through a watch channel so
/// the host bridge can react to loss without polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStatus {
    /// No session: never connected, or disconnected on request.
    NotConnected,
    /// Session established and usable.
    Ready,
    /// The peer vanished without a disconnect request. Carries the errno the
    /// host should report for the dead volume.
    PeerLost(i32),
}

struct ActiveSession {
    client: Arc<VfsClient>,
    /// Attached after the driver task is spawned; the session itself is
    /// installed first so a driver that exits instantly still finds it.
    driver: Option<JoinHandle<()>>,
    generation: u64,
}

struct Inner {
    active: Mutex<Option<ActiveSession>>,
    /// Serializes connect/disconnect so they cannot interleave.
    lifecycle: tokio::sync::Mutex<()>,
    /// Set before tearing a session down on purpose, so the driver-exit path
    /// can tell a requested disconnect from peer loss.
    disconnect_requested: AtomicBool,
    next_generation: AtomicU64,
    status_tx: watch::Sender<VolumeStatus>,
}

impl Inner {
    /// Runs when a session's driver task finishes on its own. The generation
    /// check makes this a no-op if the session was already replaced or torn
    /// down; at most one loss notification fires per session.
    fn handle_driver_exit(&self, generation: u64, clean: bool) {
        if self.disconnect_requested.load(Ordering::SeqCst) {
            return;
        }
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(session) if session.generation == generation => {}
            _ => return,
        }
        *active = None;
        drop(active);

        warn!(generation, clean, "lost connection to VFS server");
        let _ = self.status_tx.send(VolumeStatus::PeerLost(libc::ENOTCONN));
    }
}

/// Owns at most one session to a VFS server.
///
/// There is no automatic reconnection: once the peer is lost the volume
/// stays dead until the host unloads it and loads it again.
///
/// Tearing a session down — requested or lost — does not touch the
/// volume's item cache. The host reacts to the status transition by
/// deactivating or unmounting the volume, and those calls clear it; until
/// then every operation fails with `NotConnected` before reaching the
/// cache.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(VolumeStatus::NotConnected);
        Self {
            inner: Arc::new(Inner {
                active: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
                disconnect_requested: AtomicBool::new(false),
                next_generation: AtomicU64::new(1),
                status_tx,
            }),
        }
    }

    /// Establish a session to `addr` (`host:port`).
    ///
    /// Fails with [`AdapterError::AlreadyConnected`] if a session is live;
    /// use [`ensure_connected`](Self::ensure_connected) for idempotence.
    pub async fn connect(&self, addr: &str) -> AdapterResult<()> {
        validate_address(addr)?;
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.inner.active.lock().is_some() {
            return Err(AdapterError::AlreadyConnected);
        }

        let (handle, driver) = telefs_rpc::connect(addr).await?;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.disconnect_requested.store(false, Ordering::SeqCst);

        // The session must be installed before the driver task starts: a
        // peer that closes right after the handshake makes the driver exit
        // immediately, and that exit has to find the session in place for
        // the loss to be recorded instead of swallowed.
        *self.inner.active.lock() = Some(ActiveSession {
            client: Arc::new(VfsClient::new(handle)),
            driver: None,
            generation,
        });
        let _ = self.inner.status_tx.send(VolumeStatus::Ready);

        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let clean = match driver.run().await {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "connection driver exited with error");
                    false
                }
            };
            if let Some(inner) = weak.upgrade() {
                inner.handle_driver_exit(generation, clean);
            }
        });

        let mut active = self.inner.active.lock();
        if let Some(session) = active.as_mut()
            && session.generation == generation
        {
            session.driver = Some(task);
        }
        drop(active);
        info!(addr, generation, "connected to VFS server");
        Ok(())
    }

    /// Connect unless already connected.
    pub async fn ensure_connected(&self, addr: &str) -> AdapterResult<()> {
        match self.connect(addr).await {
            Err(AdapterError::AlreadyConnected) => Ok(()),
            other => other,
        }
    }

    /// Tear the session down. Safe to call repeatedly; a second call (or a
    /// call with no session) does nothing.
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.disconnect_requested.store(true, Ordering::SeqCst);
        let session = self.inner.active.lock().take();
        if let Some(session) = session {
            if let Some(task) = session.driver {
                task.abort();
            }
            let _ = self.inner.status_tx.send(VolumeStatus::NotConnected);
            info!(generation = session.generation, "disconnected from VFS server");
        }
    }

    /// Client for the live session.
    pub fn client(&self) -> AdapterResult<Arc<VfsClient>> {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|session| Arc::clone(&session.client))
            .ok_or(AdapterError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Current status snapshot.
    pub fn status(&self) -> VolumeStatus {
        *self.inner.status_tx.borrow()
    }

    /// Watch for status transitions, including peer loss.
    pub fn status_watch(&self) -> watch::Receiver<VolumeStatus> {
        self.inner.status_tx.subscribe()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_address(addr: &str) -> AdapterResult<()> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(AdapterError::InvalidAddress(addr.to_owned()));
    };
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(AdapterError::InvalidAddress(addr.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_validation() {
        assert!(validate_address("127.0.0.1:10001").is_ok());
        assert!(validate_address("example.com:80").is_ok());
        assert!(validate_address("no-port").is_err());
        assert!(validate_address(":10001").is_err());
        assert!(validate_address("host:notaport").is_err());
        assert!(validate_address("host:99999").is_err());
    }

    #[tokio::test]
    async fn client_without_session_is_not_connected() {
        let manager = ConnectionManager::new();
        assert!(matches!(
            manager.client(),
            Err(AdapterError::NotConnected)
        ));
        assert_eq!(manager.status(), VolumeStatus::NotConnected);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn disconnect_without_session_is_a_no_op() {
        let manager = ConnectionManager::new();
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(manager.status(), VolumeStatus::NotConnected);
    }

    #[tokio::test]
    async fn connect_to_unreachable_address_fails_with_rpc_error() {
        let manager = ConnectionManager::new();
        // Port 1 on localhost is assumed closed.
        let result = manager.connect("127.0.0.1:1").await;
        assert!(matches!(result, Err(AdapterError::Rpc(_))));
        assert!(!manager.is_connected());
    }
}
