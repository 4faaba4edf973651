//! Typed initiator-side wrapper over a [`CallHandle`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use telefs_rpc::{CallHandle, RpcError};

use crate::{
    CreateRequest, CreateResult, DeleteRequest, GetAttributesRequest, GetAttributesResult, ItemId,
    ItemType, LookupRequest, LookupResult, MethodId, ReadDirRequest, ReadDirResult, ReadRequest,
    ReadResult, RenameRequest, SetAttributesParams, SetAttributesRequest, VfsResult, WriteRequest,
    WriteResult,
};

/// Typed VFS client for one established session.
///
/// Methods mirror the wire protocol one to one. A `Result::Ok` still carries
/// the remote errno in the response's `error` field; only transport-level
/// failures surface as `Err`.
pub struct VfsClient {
    handle: CallHandle,
}

impl VfsClient {
    pub fn new(handle: CallHandle) -> Self {
        Self { handle }
    }

    async fn call<Req, Resp>(&self, method: MethodId, request: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = postcard::to_stdvec(request)?;
        let response = self.handle.call(method as u16, payload).await?;
        Ok(postcard::from_bytes(&response)?)
    }

    /// Resolve `name` inside the directory `parent_id`.
    pub async fn lookup(&self, parent_id: ItemId, name: &str) -> Result<LookupResult, RpcError> {
        self.call(
            MethodId::Lookup,
            &LookupRequest {
                parent_id,
                name: name.to_owned(),
            },
        )
        .await
    }

    /// Fetch current attributes for `item_id`.
    pub async fn get_attributes(&self, item_id: ItemId) -> Result<GetAttributesResult, RpcError> {
        self.call(MethodId::GetAttributes, &GetAttributesRequest { item_id })
            .await
    }

    /// Apply the given attribute changes to `item_id`.
    pub async fn set_attributes(
        &self,
        item_id: ItemId,
        params: SetAttributesParams,
    ) -> Result<VfsResult, RpcError> {
        self.call(
            MethodId::SetAttributes,
            &SetAttributesRequest { item_id, params },
        )
        .await
    }

    /// Read one page of the directory `item_id`, starting at `cursor`
    /// (`0` = from the beginning).
    pub async fn read_dir(&self, item_id: ItemId, cursor: u64) -> Result<ReadDirResult, RpcError> {
        self.call(MethodId::ReadDir, &ReadDirRequest { item_id, cursor })
            .await
    }

    /// Read up to `len` bytes of `item_id` starting at `offset`.
    pub async fn read(
        &self,
        item_id: ItemId,
        offset: u64,
        len: u64,
    ) -> Result<ReadResult, RpcError> {
        self.call(
            MethodId::Read,
            &ReadRequest {
                item_id,
                offset,
                len,
            },
        )
        .await
    }

    /// Write `data` to `item_id` at `offset`.
    pub async fn write(
        &self,
        item_id: ItemId,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<WriteResult, RpcError> {
        self.call(
            MethodId::Write,
            &WriteRequest {
                item_id,
                offset,
                data,
            },
        )
        .await
    }

    /// Create `name` of the given kind inside the directory `parent_id`.
    pub async fn create(
        &self,
        parent_id: ItemId,
        name: &str,
        item_type: ItemType,
    ) -> Result<CreateResult, RpcError> {
        self.call(
            MethodId::Create,
            &CreateRequest {
                parent_id,
                name: name.to_owned(),
                item_type,
            },
        )
        .await
    }

    /// Delete `item_id`.
    pub async fn delete(&self, item_id: ItemId) -> Result<VfsResult, RpcError> {
        self.call(MethodId::Delete, &DeleteRequest { item_id }).await
    }

    /// Move `item_id` under `new_parent_id` as `new_name`.
    pub async fn rename(
        &self,
        item_id: ItemId,
        new_parent_id: ItemId,
        new_name: &str,
    ) -> Result<VfsResult, RpcError> {
        self.call(
            MethodId::Rename,
            &RenameRequest {
                item_id,
                new_parent_id,
                new_name: new_name.to_owned(),
            },
        )
        .await
    }

    /// Connectivity check.
    pub async fn ping(&self) -> Result<String, RpcError> {
        self.call(MethodId::Ping, &()).await
    }
}
