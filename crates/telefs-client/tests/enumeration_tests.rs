//! Directory enumeration: paging, early stop, and placeholder attributes.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::TestServer;
use telefs_client::{DirSink, Item, VolumeAdapter, VolumeOps};
use telefs_proto::{DirEntry, ItemType, ROOT_ITEM_ID};

/// Accepts everything.
#[derive(Default)]
struct CollectAll {
    names: Vec<String>,
    ids: Vec<u64>,
}

impl DirSink for CollectAll {
    fn push(&mut self, entry: &DirEntry, item: &Arc<Item>) -> bool {
        assert_eq!(entry.item_id, item.id());
        self.names.push(entry.name.clone());
        self.ids.push(entry.item_id);
        true
    }
}

/// Models a fixed-size host buffer: accepts `budget` new entries per round
/// and skips entries it already delivered on a re-served page.
struct LimitedSink {
    seen: HashSet<String>,
    names: Vec<String>,
    budget: usize,
}

impl LimitedSink {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            names: Vec::new(),
            budget: 0,
        }
    }

    fn refill(&mut self, budget: usize) {
        self.budget = budget;
    }
}

impl DirSink for LimitedSink {
    fn push(&mut self, entry: &DirEntry, _item: &Arc<Item>) -> bool {
        if self.seen.contains(&entry.name) {
            return true;
        }
        if self.budget == 0 {
            return false;
        }
        self.budget -= 1;
        self.seen.insert(entry.name.clone());
        self.names.push(entry.name.clone());
        true
    }
}

async fn enumerate_fully(volume: &VolumeAdapter, dir: u64) -> CollectAll {
    let mut sink = CollectAll::default();
    let mut cursor = 0;
    loop {
        let page = volume
            .enumerate_directory(dir, cursor, &mut sink)
            .await
            .unwrap();
        if page.complete {
            return sink;
        }
        cursor = page.next_cursor;
    }
}

#[tokio::test]
async fn paged_enumeration_matches_creation_order_without_duplicates() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    // Three pages' worth of entries on top of the three sample ones.
    for i in 0..250 {
        volume
            .create_item(ROOT_ITEM_ID, &format!("f{i:03}"), ItemType::File)
            .await
            .unwrap();
    }

    let sink = enumerate_fully(&volume, ROOT_ITEM_ID).await;
    assert_eq!(sink.names.len(), 253);
    let unique: HashSet<&u64> = sink.ids.iter().collect();
    assert_eq!(unique.len(), 253);

    // Server order (creation order) is preserved across page boundaries.
    let expected: Vec<String> = (0..250).map(|i| format!("f{i:03}")).collect();
    assert_eq!(&sink.names[3..], &expected[..]);

    server.stop().await;
}

#[tokio::test]
async fn early_stop_resumes_without_loss_or_duplication() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    let mut sink = LimitedSink::new();
    let mut cursor = 0;
    let mut rounds = 0;
    loop {
        sink.refill(2);
        let page = volume
            .enumerate_directory(ROOT_ITEM_ID, cursor, &mut sink)
            .await
            .unwrap();
        rounds += 1;
        assert!(rounds < 10, "enumeration failed to make progress");
        if page.complete {
            break;
        }
        cursor = page.next_cursor;
    }

    // Sample root holds documents, hello.txt, test.sh; budget 2 forces at
    // least one early stop, yet the final set is complete and duplicate-free.
    assert!(rounds >= 2);
    assert_eq!(sink.names.len(), 3);
    assert_eq!(sink.seen.len(), 3);

    server.stop().await;
}

#[tokio::test]
async fn early_stop_returns_the_input_cursor() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    let mut sink = LimitedSink::new();
    sink.refill(1);
    let page = volume
        .enumerate_directory(ROOT_ITEM_ID, 0, &mut sink)
        .await
        .unwrap();
    assert!(!page.complete);
    assert_eq!(page.next_cursor, 0);
    assert_eq!(sink.names.len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn enumerating_a_file_is_enotdir() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    let (hello, _) = volume.lookup_item(ROOT_ITEM_ID, "hello.txt").await.unwrap();
    let mut sink = CollectAll::default();
    let err = volume
        .enumerate_directory(hello.id(), 0, &mut sink)
        .await
        .unwrap_err();
    assert_eq!(err.to_errno(), libc::ENOTDIR);
    assert!(sink.names.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn placeholder_mode_is_corrected_by_an_attributes_query() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    let sink = enumerate_fully(&volume, ROOT_ITEM_ID).await;
    let test_sh_id = sink.ids[sink.names.iter().position(|n| n == "test.sh").unwrap()];

    // Listings carry no mode, so the cached item starts with the kind
    // default for a file.
    let cached = volume.cache().get(test_sh_id).unwrap();
    assert_eq!(cached.attributes().mode, 0o644);

    // An explicit attributes query fixes it up, on the same item object.
    let fresh = volume.attributes(test_sh_id).await.unwrap();
    assert_eq!(fresh.mode, 0o755);
    assert_eq!(cached.attributes().mode, 0o755);

    server.stop().await;
}

#[tokio::test]
async fn enumeration_never_downgrades_real_attributes() {
    let server = TestServer::start_sample().await;
    let (_service, volume) = common::mounted_volume(&server).await;

    // Lookup caches authoritative attributes first.
    let (test_sh, _) = volume.lookup_item(ROOT_ITEM_ID, "test.sh").await.unwrap();
    assert_eq!(test_sh.attributes().mode, 0o755);

    let _ = enumerate_fully(&volume, ROOT_ITEM_ID).await;

    // The listing reuses the cached item and leaves its snapshot alone.
    let cached = volume.cache().get(test_sh.id()).unwrap();
    assert!(Arc::ptr_eq(&test_sh, &cached));
    assert_eq!(cached.attributes().mode, 0o755);

    server.stop().await;
}
