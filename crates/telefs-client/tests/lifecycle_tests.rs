//! Probe/load/unload and connection lifecycle against a live server.

mod common;

use common::TestServer;
use telefs_client::{AdapterError, FsService, ProbeOutcome, VolumeOps, VolumeStatus};
use telefs_proto::{ItemType, ROOT_ITEM_ID};

#[tokio::test]
async fn probe_reports_usable_and_leaves_the_session_up() {
    let server = TestServer::start_sample().await;
    let service = FsService::new();

    let outcome = service.probe(&server.resource).await.unwrap();
    assert_eq!(
        outcome,
        ProbeOutcome::Usable {
            container_name: "pong".into()
        }
    );
    assert_eq!(service.status(), VolumeStatus::Ready);

    // The load that follows reuses the probed session.
    let volume = service.load(&server.resource).await.unwrap();
    volume.activate().await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn activate_caches_the_root_as_its_own_parent() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    let root = volume.cache().get(ROOT_ITEM_ID).expect("root cached");
    assert_eq!(root.id(), ROOT_ITEM_ID);
    assert_eq!(root.parent_id(), ROOT_ITEM_ID);
    assert_eq!(root.kind(), ItemType::Directory);
    assert_eq!(root.name(), "");
    assert_eq!(volume.cache().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn load_twice_is_idempotent() {
    let server = TestServer::start_sample().await;
    let service = FsService::new();

    let first = service.load(&server.resource).await.unwrap();
    first.activate().await.unwrap();
    let second = service.load(&server.resource).await.unwrap();
    second.activate().await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn unload_twice_is_equivalent_to_once() {
    let server = TestServer::start_sample().await;
    let (service, volume) = common::mounted_volume(&server).await;

    service.unload().await;
    service.unload().await;
    assert_eq!(service.status(), VolumeStatus::NotConnected);

    // Operations after unload fail with not-connected, not a hang.
    let err = volume.attributes(ROOT_ITEM_ID).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotConnected));
    assert_eq!(err.to_errno(), libc::ENOTCONN);

    server.stop().await;
}

#[tokio::test]
async fn unmount_clears_the_cache() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    volume.lookup_item(ROOT_ITEM_ID, "hello.txt").await.unwrap();
    assert!(volume.cache().len() > 1);

    volume.unmount().await.unwrap();
    assert!(volume.cache().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn deactivate_clears_the_cache_but_keeps_the_session() {
    let server = TestServer::start_sample().await;
    let (service, volume) = common::mounted_volume(&server).await;

    volume.deactivate().await.unwrap();
    assert!(volume.cache().is_empty());
    assert_eq!(service.status(), VolumeStatus::Ready);

    // Re-activation works on the same session.
    volume.activate().await.unwrap();
    assert_eq!(volume.cache().len(), 1);

    server.stop().await;
}
