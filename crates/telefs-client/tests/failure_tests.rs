//! Deadline and peer-loss behavior.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestServer;
use telefs_client::{
    AdapterError, ConnectionManager, FsService, ProbeOutcome, RequestGateway, VolumeOps,
    VolumeStatus,
};
use telefs_proto::ROOT_ITEM_ID;
use telefs_rpc::{DispatchError, ServiceDispatcher};
use telefs_server::{MemoryVfs, testing::DelayVfs};

#[tokio::test]
async fn slow_call_times_out_with_eio_and_no_cache_mutation() {
    let server = TestServer::start(DelayVfs::new(
        MemoryVfs::with_sample_tree(),
        Duration::from_millis(500),
    ))
    .await;

    let service = FsService::with_gateway(RequestGateway::with_timeout(Duration::from_millis(50)));
    let volume = service.load(&server.resource).await.unwrap();

    let err = volume.activate().await.unwrap_err();
    assert!(matches!(err, AdapterError::Timeout));
    assert_eq!(err.to_errno(), libc::EIO);
    // The losing call was cancelled before it could touch the cache.
    assert!(volume.cache().is_empty());

    // The volume answers (with an error) rather than hanging.
    let err = volume.attributes(ROOT_ITEM_ID).await.unwrap_err();
    assert_eq!(err.to_errno(), libc::EIO);

    server.stop().await;
}

#[tokio::test]
async fn slow_but_in_deadline_server_works_normally() {
    let server = TestServer::start(DelayVfs::new(
        MemoryVfs::with_sample_tree(),
        Duration::from_millis(20),
    ))
    .await;
    let (_service, volume) = common::mounted_volume(&server).await;

    let (hello, _) = volume.lookup_item(ROOT_ITEM_ID, "hello.txt").await.unwrap();
    let mut buf = [0u8; 32];
    let n = volume.read(hello.id(), 0, 32, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"Hello, World!\n");

    server.stop().await;
}

#[tokio::test]
async fn probe_against_an_unresponsive_server_is_unusable() {
    let server = TestServer::start(DelayVfs::new(
        MemoryVfs::with_sample_tree(),
        Duration::from_millis(500),
    ))
    .await;

    let service = FsService::with_gateway(RequestGateway::with_timeout(Duration::from_millis(50)));
    let outcome = service.probe(&server.resource).await.unwrap();
    assert_eq!(outcome, ProbeOutcome::Unusable);
    assert_eq!(service.status(), VolumeStatus::NotConnected);

    server.stop().await;
}

#[tokio::test]
async fn in_flight_call_resolves_when_the_peer_dies() {
    let server = TestServer::start(DelayVfs::new(
        MemoryVfs::with_sample_tree(),
        Duration::from_millis(500),
    ))
    .await;
    let (_service, volume) = {
        // Activation must survive the delay; the default 5 s deadline does.
        common::mounted_volume(&server).await
    };

    let pending = tokio::spawn({
        let volume = std::sync::Arc::clone(&volume);
        async move { volume.attributes(ROOT_ITEM_ID).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.stop().await;

    // The call resolves with an I/O failure instead of hanging.
    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("call must resolve once the peer is gone")
        .unwrap();
    let err = result.unwrap_err();
    assert_eq!(err.to_errno(), libc::EIO);
}

#[tokio::test]
async fn peer_loss_transitions_the_volume_and_later_calls_fail_not_connected() {
    let server = TestServer::start_sample().await;
    let (service, volume) = common::mounted_volume(&server).await;
    let mut status = service.status_watch();

    server.stop().await;

    // The driver notices the loss and publishes it exactly once.
    tokio::time::timeout(
        Duration::from_secs(2),
        status.wait_for(|s| matches!(s, VolumeStatus::PeerLost(_))),
    )
    .await
    .expect("loss must be published")
    .unwrap();
    assert_eq!(service.status(), VolumeStatus::PeerLost(libc::ENOTCONN));

    // Everything after detection fails with not-connected until remount.
    let err = volume.attributes(ROOT_ITEM_ID).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotConnected));
    assert_eq!(err.to_errno(), libc::ENOTCONN);
    let err = volume
        .lookup_item(ROOT_ITEM_ID, "hello.txt")
        .await
        .unwrap_err();
    assert_eq!(err.to_errno(), libc::ENOTCONN);
}

struct RejectAll;

#[async_trait::async_trait]
impl ServiceDispatcher for RejectAll {
    async fn dispatch(&self, method: u16, _payload: Vec<u8>) -> Result<Vec<u8>, DispatchError> {
        Err(DispatchError::UnknownMethod(method))
    }
}

#[tokio::test]
async fn peer_closing_right_after_the_handshake_still_publishes_loss() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        // Complete the handshake, then drop the session on the spot, so the
        // client's driver can exit before connect() has even returned.
        let driver = telefs_rpc::accept(socket, Arc::new(RejectAll)).await.unwrap();
        drop(driver);
    });

    let manager = ConnectionManager::new();
    manager.connect(&addr.to_string()).await.unwrap();

    let mut status = manager.status_watch();
    tokio::time::timeout(
        Duration::from_secs(2),
        status.wait_for(|s| matches!(s, VolumeStatus::PeerLost(_))),
    )
    .await
    .expect("instant peer close must still surface as loss")
    .unwrap();
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn requested_disconnect_is_not_reported_as_peer_loss() {
    let server = TestServer::start_sample().await;
    let (service, _volume) = common::mounted_volume(&server).await;
    let status = service.status_watch();

    service.unload().await;
    // Give a stray driver-exit notification time to fire if one were going to.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*status.borrow(), VolumeStatus::NotConnected);

    server.stop().await;
}
