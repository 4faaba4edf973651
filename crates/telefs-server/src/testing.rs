//! Test-support backends.

use std::time::Duration;

use async_trait::async_trait;
use telefs_proto::{
    CreateResult, GetAttributesResult, ItemId, ItemType, LookupResult, ReadDirResult, ReadResult,
    SetAttributesParams, Vfs, VfsResult, WriteResult,
};

/// Wraps another backend and delays every operation by a fixed amount.
/// Used to exercise the adapter's per-call deadline.
pub struct DelayVfs<V> {
    inner: V,
    delay: Duration,
}

impl<V: Vfs> DelayVfs<V> {
    pub fn new(inner: V, delay: Duration) -> Self {
        Self { inner, delay }
    }

    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl<V: Vfs> Vfs for DelayVfs<V> {
    async fn lookup(&self, parent_id: ItemId, name: String) -> LookupResult {
        self.pause().await;
        self.inner.lookup(parent_id, name).await
    }

    async fn get_attributes(&self, item_id: ItemId) -> GetAttributesResult {
        self.pause().await;
        self.inner.get_attributes(item_id).await
    }

    async fn set_attributes(&self, item_id: ItemId, params: SetAttributesParams) -> VfsResult {
        self.pause().await;
        self.inner.set_attributes(item_id, params).await
    }

    async fn read_dir(&self, item_id: ItemId, cursor: u64) -> ReadDirResult {
        self.pause().await;
        self.inner.read_dir(item_id, cursor).await
    }

    async fn read(&self, item_id: ItemId, offset: u64, len: u64) -> ReadResult {
        self.pause().await;
        self.inner.read(item_id, offset, len).await
    }

    async fn write(&self, item_id: ItemId, offset: u64, data: Vec<u8>) -> WriteResult {
        self.pause().await;
        self.inner.write(item_id, offset, data).await
    }

    async fn create(&self, parent_id: ItemId, name: String, item_type: ItemType) -> CreateResult {
        self.pause().await;
        self.inner.create(parent_id, name, item_type).await
    }

    async fn delete(&self, item_id: ItemId) -> VfsResult {
        self.pause().await;
        self.inner.delete(item_id).await
    }

    async fn rename(&self, item_id: ItemId, new_parent_id: ItemId, new_name: String) -> VfsResult {
        self.pause().await;
        self.inner.rename(item_id, new_parent_id, new_name).await
    }

    async fn ping(&self) -> String {
        self.pause().await;
        self.inner.ping().await
    }
}
