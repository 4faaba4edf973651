//! Host-framework entry points: probe, load, unload.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionManager, VolumeStatus};
use crate::error::AdapterResult;
use crate::gateway::RequestGateway;
use crate::resource;
use crate::volume::VolumeAdapter;

/// What probing a resource concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered; `container_name` labels the volume for the host.
    Usable { container_name: String },
    /// The server is unreachable or unresponsive.
    Unusable,
}

/// One instance per mountable volume; constructed at load time, torn down
/// at unload. Owns the connection the volume adapter operates over.
pub struct FsService {
    manager: ConnectionManager,
    gateway: RequestGateway,
}

impl FsService {
    pub fn new() -> Self {
        Self::with_gateway(RequestGateway::new())
    }

    /// Service with a non-default per-call deadline. Tests shorten it.
    pub fn with_gateway(gateway: RequestGateway) -> Self {
        Self {
            manager: ConnectionManager::new(),
            gateway,
        }
    }

    /// Check whether `resource` names a server we can talk to.
    ///
    /// A malformed resource is an error; an unreachable or unresponsive
    /// server is `Unusable`, not an error. A successful probe leaves the
    /// session up for the load that typically follows.
    pub async fn probe(&self, resource: &str) -> AdapterResult<ProbeOutcome> {
        let addr = resource::server_address(resource)?;
        if let Err(e) = self.manager.ensure_connected(&addr).await {
            warn!(resource, error = %e, "probe could not connect");
            return Ok(ProbeOutcome::Unusable);
        }
        let client = self.manager.client()?;
        match self.gateway.invoke(client.ping()).await {
            Ok(container_name) => {
                debug!(resource, container_name, "probe succeeded");
                Ok(ProbeOutcome::Usable { container_name })
            }
            Err(e) => {
                warn!(resource, error = %e, "probe ping failed");
                self.manager.disconnect().await;
                Ok(ProbeOutcome::Unusable)
            }
        }
    }

    /// Connect (if not already) and hand out the volume for `resource`.
    /// The caller activates the volume before using it.
    pub async fn load(&self, resource: &str) -> AdapterResult<Arc<VolumeAdapter>> {
        let addr = resource::server_address(resource)?;
        self.manager.ensure_connected(&addr).await?;
        info!(resource, "volume loaded");
        Ok(Arc::new(VolumeAdapter::new(
            self.manager.clone(),
            self.gateway,
        )))
    }

    /// Tear the session down. Idempotent.
    pub async fn unload(&self) {
        self.manager.disconnect().await;
        info!("volume unloaded");
    }

    pub fn status(&self) -> VolumeStatus {
        self.manager.status()
    }

    pub fn status_watch(&self) -> watch::Receiver<VolumeStatus> {
        self.manager.status_watch()
    }
}

impl Default for FsService {
    fn default() -> Self {
        Self::new()
    }
}
