//! Acceptor-side service trait and dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use telefs_rpc::{DispatchError, ServiceDispatcher};

use crate::{
    CreateRequest, DeleteRequest, GetAttributesRequest, ItemId, ItemType, LookupRequest, MethodId,
    ReadDirRequest, ReadRequest, RenameRequest, SetAttributesParams, SetAttributesRequest,
    WriteRequest,
};

/// The VFS backend interface.
///
/// Remote failures are reported in-band through each result's `error` field,
/// never by panicking or by transport errors.
#[async_trait]
pub trait Vfs: Send + Sync + 'static {
    /// Look up an item by name in a parent directory.
    async fn lookup(&self, parent_id: ItemId, name: String) -> crate::LookupResult;

    /// Get current attributes for an item.
    async fn get_attributes(&self, item_id: ItemId) -> crate::GetAttributesResult;

    /// Apply attribute changes to an item.
    async fn set_attributes(&self, item_id: ItemId, params: SetAttributesParams)
    -> crate::VfsResult;

    /// Read one page of directory entries. `cursor` 0 starts from the
    /// beginning; the returned `next_cursor` resumes, 0 meaning done.
    async fn read_dir(&self, item_id: ItemId, cursor: u64) -> crate::ReadDirResult;

    /// Read file contents.
    async fn read(&self, item_id: ItemId, offset: u64, len: u64) -> crate::ReadResult;

    /// Write file contents.
    async fn write(&self, item_id: ItemId, offset: u64, data: Vec<u8>) -> crate::WriteResult;

    /// Create a new file or directory.
    async fn create(&self, parent_id: ItemId, name: String, item_type: ItemType)
    -> crate::CreateResult;

    /// Delete an item.
    async fn delete(&self, item_id: ItemId) -> crate::VfsResult;

    /// Rename or move an item.
    async fn rename(&self, item_id: ItemId, new_parent_id: ItemId, new_name: String)
    -> crate::VfsResult;

    /// Connectivity check.
    async fn ping(&self) -> String;
}

/// Bridges the transport's raw `(method, payload)` dispatch onto a [`Vfs`]
/// implementation.
pub struct VfsDispatcher<V: Vfs> {
    vfs: Arc<V>,
}

impl<V: Vfs> VfsDispatcher<V> {
    pub fn new(vfs: Arc<V>) -> Self {
        Self { vfs }
    }
}

fn decode<Req: DeserializeOwned>(payload: &[u8]) -> Result<Req, DispatchError> {
    postcard::from_bytes(payload).map_err(|e| DispatchError::Malformed(e.to_string()))
}

fn encode<Resp: Serialize>(response: &Resp) -> Result<Vec<u8>, DispatchError> {
    postcard::to_stdvec(response).map_err(|e| DispatchError::Malformed(e.to_string()))
}

#[async_trait]
impl<V: Vfs> ServiceDispatcher for VfsDispatcher<V> {
    async fn dispatch(&self, method: u16, payload: Vec<u8>) -> Result<Vec<u8>, DispatchError> {
        let Some(method) = MethodId::from_u16(method) else {
            return Err(DispatchError::UnknownMethod(method));
        };
        match method {
            MethodId::Lookup => {
                let req: LookupRequest = decode(&payload)?;
                encode(&self.vfs.lookup(req.parent_id, req.name).await)
            }
            MethodId::GetAttributes => {
                let req: GetAttributesRequest = decode(&payload)?;
                encode(&self.vfs.get_attributes(req.item_id).await)
            }
            MethodId::SetAttributes => {
                let req: SetAttributesRequest = decode(&payload)?;
                encode(&self.vfs.set_attributes(req.item_id, req.params).await)
            }
            MethodId::ReadDir => {
                let req: ReadDirRequest = decode(&payload)?;
                encode(&self.vfs.read_dir(req.item_id, req.cursor).await)
            }
            MethodId::Read => {
                let req: ReadRequest = decode(&payload)?;
                encode(&self.vfs.read(req.item_id, req.offset, req.len).await)
            }
            MethodId::Write => {
                let req: WriteRequest = decode(&payload)?;
                encode(&self.vfs.write(req.item_id, req.offset, req.data).await)
            }
            MethodId::Create => {
                let req: CreateRequest = decode(&payload)?;
                encode(&self.vfs.create(req.parent_id, req.name, req.item_type).await)
            }
            MethodId::Delete => {
                let req: DeleteRequest = decode(&payload)?;
                encode(&self.vfs.delete(req.item_id).await)
            }
            MethodId::Rename => {
                let req: RenameRequest = decode(&payload)?;
                encode(
                    &self
                        .vfs
                        .rename(req.item_id, req.new_parent_id, req.new_name)
                        .await,
                )
            }
            MethodId::Ping => encode(&self.vfs.ping().await),
        }
    }
}
