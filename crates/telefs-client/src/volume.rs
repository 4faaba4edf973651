//! The volume adapter: one method per host filesystem primitive.

use std::sync::Arc;

use async_trait::async_trait;
use telefs_proto::{
    ItemAttributes, ItemId, ItemType, ROOT_ITEM_ID, SetAttributesParams, VfsClient,
};
use tracing::debug;

use crate::connection::ConnectionManager;
use crate::enumerator::{DirSink, DirectoryEnumerator, PageCursor};
use crate::error::{AdapterError, AdapterResult, ok_or_remote};
use crate::gateway::RequestGateway;
use crate::item::{Item, ItemCache};

/// Static statfs-style numbers for the volume. The backend does not report
/// capacity, so these are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStatistics {
    pub block_size: u32,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub available_blocks: u64,
    pub total_files: u64,
    pub free_files: u64,
}

impl Default for VolumeStatistics {
    fn default() -> Self {
        Self {
            block_size: 4096,
            total_blocks: 1 << 20,
            free_blocks: 1 << 19,
            available_blocks: 1 << 19,
            total_files: 1 << 20,
            free_files: 1 << 19,
        }
    }
}

/// The capability set the host framework invokes, one method per filesystem
/// primitive. Every method resolves exactly once, with a value or an error
/// the caller maps through [`AdapterError::to_errno`].
#[async_trait]
pub trait VolumeOps: Send + Sync {
    /// Prepare the volume: fetch the root's attributes and cache the root
    /// item (its own parent). Must be called before any other operation.
    async fn activate(&self) -> AdapterResult<Arc<Item>>;
    /// Drop all cached items. The session stays up.
    async fn deactivate(&self) -> AdapterResult<()>;
    /// No local durable state to prepare.
    async fn mount(&self) -> AdapterResult<()>;
    /// Drop all cached items.
    async fn unmount(&self) -> AdapterResult<()>;
    /// No local durable state to flush.
    async fn synchronize(&self) -> AdapterResult<()>;

    fn statistics(&self) -> VolumeStatistics;

    /// Always re-fetches from the server; the cache is never trusted for an
    /// attribute query. Refreshes the cached snapshot.
    async fn attributes(&self, handle: ItemId) -> AdapterResult<ItemAttributes>;
    /// Apply changes remotely, then refresh and return the new attributes.
    async fn set_attributes(
        &self,
        handle: ItemId,
        params: SetAttributesParams,
    ) -> AdapterResult<ItemAttributes>;

    /// Resolve `name` under `parent`. Returns the item plus the name it was
    /// resolved under.
    async fn lookup_item(&self, parent: ItemId, name: &str) -> AdapterResult<(Arc<Item>, String)>;
    async fn create_item(
        &self,
        parent: ItemId,
        name: &str,
        kind: ItemType,
    ) -> AdapterResult<Arc<Item>>;
    async fn remove_item(&self, handle: ItemId) -> AdapterResult<()>;
    async fn rename_item(
        &self,
        handle: ItemId,
        new_parent: ItemId,
        new_name: &str,
    ) -> AdapterResult<()>;
    /// The host no longer references this handle; drop it from the cache.
    async fn reclaim_item(&self, handle: ItemId) -> AdapterResult<()>;

    /// Enumerate one page of `dir` into `sink`.
    async fn enumerate_directory(
        &self,
        dir: ItemId,
        cursor: u64,
        sink: &mut (dyn DirSink + Send),
    ) -> AdapterResult<PageCursor>;

    /// Read into `buf`; returns the number of bytes copied. A short result
    /// is not an error.
    async fn read(
        &self,
        handle: ItemId,
        offset: u64,
        len: u64,
        buf: &mut [u8],
    ) -> AdapterResult<usize>;
    /// Write `data`; returns the server-reported byte count verbatim.
    async fn write(&self, handle: ItemId, offset: u64, data: &[u8]) -> AdapterResult<u64>;

    async fn read_symlink(&self, handle: ItemId) -> AdapterResult<String>;
    async fn create_symlink(
        &self,
        parent: ItemId,
        name: &str,
        target: &str,
    ) -> AdapterResult<Arc<Item>>;
    async fn create_link(
        &self,
        handle: ItemId,
        parent: ItemId,
        name: &str,
    ) -> AdapterResult<Arc<Item>>;

    /// Open-file state is not tracked; every read/write is a fresh remote
    /// call addressed by identifier.
    async fn open_item(&self, handle: ItemId) -> AdapterResult<()>;
    async fn close_item(&self, handle: ItemId) -> AdapterResult<()>;
    /// Authorization is not enforced client-side.
    async fn check_access(&self, handle: ItemId) -> AdapterResult<bool>;
}

/// Bridges the host's per-operation callbacks to the remote VFS.
pub struct VolumeAdapter {
    manager: ConnectionManager,
    cache: ItemCache,
    gateway: RequestGateway,
}

impl VolumeAdapter {
    pub fn new(manager: ConnectionManager, gateway: RequestGateway) -> Self {
        Self {
            manager,
            cache: ItemCache::new(),
            gateway,
        }
    }

    /// The cache is exposed for tests asserting identity stability and
    /// timeout non-mutation.
    pub fn cache(&self) -> &ItemCache {
        &self.cache
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.manager
    }

    fn client(&self) -> AdapterResult<Arc<VfsClient>> {
        self.manager.client()
    }

    fn cached(&self, handle: ItemId) -> AdapterResult<Arc<Item>> {
        self.cache
            .get(handle)
            .ok_or(AdapterError::InvalidHandle(handle))
    }

    /// Fetch fresh attributes for `id` and refresh the cached entry.
    async fn fetch_attributes(
        &self,
        client: &VfsClient,
        id: ItemId,
        name: &str,
        parent: ItemId,
    ) -> AdapterResult<Arc<Item>> {
        let result = self.gateway.invoke(client.get_attributes(id)).await?;
        ok_or_remote(result.error)?;
        Ok(self.cache.update_or_insert(name, parent, result.attrs))
    }
}

#[async_trait]
impl VolumeOps for VolumeAdapter {
    async fn activate(&self) -> AdapterResult<Arc<Item>> {
        let client = self.client()?;
        // Root has no name and is its own parent.
        let root = self
            .fetch_attributes(&client, ROOT_ITEM_ID, "", ROOT_ITEM_ID)
            .await?;
        debug!(items = self.cache.len(), "volume activated");
        Ok(root)
    }

    async fn deactivate(&self) -> AdapterResult<()> {
        self.cache.clear();
        Ok(())
    }

    async fn mount(&self) -> AdapterResult<()> {
        Ok(())
    }

    async fn unmount(&self) -> AdapterResult<()> {
        self.cache.clear();
        Ok(())
    }

    async fn synchronize(&self) -> AdapterResult<()> {
        Ok(())
    }

    fn statistics(&self) -> VolumeStatistics {
        VolumeStatistics::default()
    }

    async fn attributes(&self, handle: ItemId) -> AdapterResult<ItemAttributes> {
        let client = self.client()?;
        // Deliberately no cache check: the query goes to the server even for
        // a handle we no longer track, so a removed item reports the
        // backend's not-found rather than a local handle error.
        let result = self.gateway.invoke(client.get_attributes(handle)).await?;
        ok_or_remote(result.error)?;
        if let Some(item) = self.cache.get(handle) {
            item.update_attributes(result.attrs.clone());
        }
        Ok(result.attrs)
    }

    async fn set_attributes(
        &self,
        handle: ItemId,
        params: SetAttributesParams,
    ) -> AdapterResult<ItemAttributes> {
        self.cached(handle)?;
        let client = self.client()?;
        let result = self
            .gateway
            .invoke(client.set_attributes(handle, params))
            .await?;
        ok_or_remote(result.error)?;
        self.attributes(handle).await
    }

    async fn lookup_item(&self, parent: ItemId, name: &str) -> AdapterResult<(Arc<Item>, String)> {
        self.cached(parent)?;
        let client = self.client()?;
        let resolved = self.gateway.invoke(client.lookup(parent, name)).await?;
        ok_or_remote(resolved.error)?;
        // The lookup response lacks size/time/mode; a second call fills
        // them in. A cache hit keeps the existing Arc so the host's
        // identity tracking stays valid.
        let item = self
            .fetch_attributes(&client, resolved.item_id, name, parent)
            .await?;
        Ok((item, name.to_owned()))
    }

    async fn create_item(
        &self,
        parent: ItemId,
        name: &str,
        kind: ItemType,
    ) -> AdapterResult<Arc<Item>> {
        self.cached(parent)?;
        let client = self.client()?;
        let created = self.gateway.invoke(client.create(parent, name, kind)).await?;
        ok_or_remote(created.error)?;
        let attrs = self
            .gateway
            .invoke(client.get_attributes(created.item_id))
            .await?;
        ok_or_remote(attrs.error)?;
        // Creation always yields a fresh identifier, so this entry is new.
        let item = Arc::new(Item::new(created.item_id, name.to_owned(), parent, attrs.attrs));
        self.cache.insert(Arc::clone(&item));
        Ok(item)
    }

    async fn remove_item(&self, handle: ItemId) -> AdapterResult<()> {
        self.cached(handle)?;
        let client = self.client()?;
        let result = self.gateway.invoke(client.delete(handle)).await?;
        ok_or_remote(result.error)?;
        self.cache.remove(handle);
        Ok(())
    }

    async fn rename_item(
        &self,
        handle: ItemId,
        new_parent: ItemId,
        new_name: &str,
    ) -> AdapterResult<()> {
        self.cached(handle)?;
        let client = self.client()?;
        let result = self
            .gateway
            .invoke(client.rename(handle, new_parent, new_name))
            .await?;
        ok_or_remote(result.error)?;
        // The cached name is not rewritten here; a later lookup or
        // attributes refresh repairs it.
        Ok(())
    }

    async fn reclaim_item(&self, handle: ItemId) -> AdapterResult<()> {
        self.cache.remove(handle);
        Ok(())
    }

    async fn enumerate_directory(
        &self,
        dir: ItemId,
        cursor: u64,
        sink: &mut (dyn DirSink + Send),
    ) -> AdapterResult<PageCursor> {
        self.cached(dir)?;
        let client = self.client()?;
        DirectoryEnumerator::new(&client, &self.cache, &self.gateway)
            .read_page(dir, cursor, sink)
            .await
    }

    async fn read(
        &self,
        handle: ItemId,
        offset: u64,
        len: u64,
        buf: &mut [u8],
    ) -> AdapterResult<usize> {
        self.cached(handle)?;
        let client = self.client()?;
        let result = self.gateway.invoke(client.read(handle, offset, len)).await?;
        ok_or_remote(result.error)?;
        let n = result
            .data
            .len()
            .min(len as usize)
            .min(buf.len());
        buf[..n].copy_from_slice(&result.data[..n]);
        Ok(n)
    }

    async fn write(&self, handle: ItemId, offset: u64, data: &[u8]) -> AdapterResult<u64> {
        // The host may reclaim its buffer the moment control returns to it,
        // so the bytes are copied before the first suspension point.
        let owned = data.to_vec();
        self.cached(handle)?;
        let client = self.client()?;
        let result = self.gateway.invoke(client.write(handle, offset, owned)).await?;
        ok_or_remote(result.error)?;
        Ok(result.bytes_written)
    }

    async fn read_symlink(&self, _handle: ItemId) -> AdapterResult<String> {
        Err(AdapterError::NotSupported)
    }

    async fn create_symlink(
        &self,
        _parent: ItemId,
        _name: &str,
        _target: &str,
    ) -> AdapterResult<Arc<Item>> {
        Err(AdapterError::NotSupported)
    }

    async fn create_link(
        &self,
        _handle: ItemId,
        _parent: ItemId,
        _name: &str,
    ) -> AdapterResult<Arc<Item>> {
        Err(AdapterError::NotSupported)
    }

    async fn open_item(&self, _handle: ItemId) -> AdapterResult<()> {
        Ok(())
    }

    async fn close_item(&self, _handle: ItemId) -> AdapterResult<()> {
        Ok(())
    }

    async fn check_access(&self, handle: ItemId) -> AdapterResult<bool> {
        self.cached(handle)?;
        Ok(true)
    }
}
