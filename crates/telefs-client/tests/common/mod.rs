//! In-process server harness for adapter integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use telefs_client::{FsService, RequestGateway, VolumeAdapter, VolumeOps};
use telefs_proto::Vfs;
use telefs_server::{MemoryVfs, VfsServer};
use tokio_util::sync::CancellationToken;

pub struct TestServer {
    pub resource: String,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    /// Serve `vfs` on an ephemeral loopback port.
    pub async fn start<V: Vfs>(vfs: V) -> Self {
        let server = VfsServer::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = server.local_addr().expect("local addr");
        let shutdown = server.shutdown_token();
        let task = tokio::spawn(server.run(Arc::new(vfs)));
        Self {
            resource: format!("telefs://{addr}"),
            shutdown,
            task,
        }
    }

    pub async fn start_sample() -> Self {
        Self::start(MemoryVfs::with_sample_tree()).await
    }

    /// Kill the server and every live session; peers observe connection loss.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}

/// Load and activate a volume against `server` with the default deadline.
pub async fn mounted_volume(server: &TestServer) -> (FsService, Arc<VolumeAdapter>) {
    mounted_volume_with_gateway(server, RequestGateway::new()).await
}

pub async fn mounted_volume_with_gateway(
    server: &TestServer,
    gateway: RequestGateway,
) -> (FsService, Arc<VolumeAdapter>) {
    let service = FsService::with_gateway(gateway);
    let volume = service.load(&server.resource).await.expect("load volume");
    volume.activate().await.expect("activate volume");
    (service, volume)
}
