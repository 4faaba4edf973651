//! telefs VFS service definition.
//!
//! Shared between the client adapter and VFS backends: the item model, the
//! per-method request/response payloads, errno-style error codes, and the
//! method-id table. [`client::VfsClient`] is the typed initiator-side
//! wrapper; [`service::Vfs`]/[`service::VfsDispatcher`] are the
//! acceptor-side counterparts.
//!
//! Every response carries an errno-like `error` field. Zero means success;
//! any non-zero value is a remote error reported by the backend, distinct
//! from a transport failure (which surfaces as
//! [`telefs_rpc::RpcError`] instead).

use serde::{Deserialize, Serialize};

pub mod client;
pub mod service;

pub use client::VfsClient;
pub use service::{Vfs, VfsDispatcher};

/// Identifier for one filesystem node, assigned by the backend. Stable and
/// unique for the lifetime of a session.
pub type ItemId = u64;

/// The identifier reserved for the volume root.
pub const ROOT_ITEM_ID: ItemId = 1;

/// Kind of a filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    File,
    Directory,
    Symlink,
}

/// Point-in-time attributes of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub item_id: ItemId,
    pub item_type: ItemType,
    pub size: u64,
    /// Unix timestamp, seconds since the epoch.
    pub modified_time: u64,
    /// Unix timestamp, seconds since the epoch.
    pub created_time: u64,
    /// POSIX mode bits.
    pub mode: u32,
}

/// One entry of a directory listing. Carries no mode or size; callers fetch
/// full attributes separately when they need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub item_id: ItemId,
    pub item_type: ItemType,
}

/// Attribute changes for `set_attributes`. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SetAttributesParams {
    pub mode: Option<u32>,
    pub modified_time: Option<u64>,
}

// ---------------------------------------------------------------------------
// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub item_id: ItemId,
    pub item_type: ItemType,
    pub error: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAttributesResult {
    pub attrs: ItemAttributes,
    pub error: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadDirResult {
    pub entries: Vec<DirEntry>,
    /// Opaque continuation token; `0` means the listing is complete.
    pub next_cursor: u64,
    pub error: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub data: Vec<u8>,
    pub error: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub bytes_written: u64,
    pub error: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResult {
    pub item_id: ItemId,
    pub error: i32,
}

/// Plain success/error result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfsResult {
    pub error: i32,
}

// ---------------------------------------------------------------------------
// Requests

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    pub parent_id: ItemId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAttributesRequest {
    pub item_id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAttributesRequest {
    pub item_id: ItemId,
    pub params: SetAttributesParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadDirRequest {
    pub item_id: ItemId,
    pub cursor: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRequest {
    pub item_id: ItemId,
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub item_id: ItemId,
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub parent_id: ItemId,
    pub name: String,
    pub item_type: ItemType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub item_id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub item_id: ItemId,
    pub new_parent_id: ItemId,
    pub new_name: String,
}

// ---------------------------------------------------------------------------
// Method table

/// Wire method ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MethodId {
    Lookup = 1,
    GetAttributes = 2,
    SetAttributes = 3,
    ReadDir = 4,
    Read = 5,
    Write = 6,
    Create = 7,
    Delete = 8,
    Rename = 9,
    Ping = 10,
}

impl MethodId {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Lookup),
            2 => Some(Self::GetAttributes),
            3 => Some(Self::SetAttributes),
            4 => Some(Self::ReadDir),
            5 => Some(Self::Read),
            6 => Some(Self::Write),
            7 => Some(Self::Create),
            8 => Some(Self::Delete),
            9 => Some(Self::Rename),
            10 => Some(Self::Ping),
            _ => None,
        }
    }
}

/// Errno-like remote error codes. These are protocol constants, not host
/// errno values; the adapter maps them onto the host's taxonomy.
pub mod errno {
    /// No error.
    pub const OK: i32 = 0;
    /// No such file or directory.
    pub const ENOENT: i32 = 2;
    /// I/O error.
    pub const EIO: i32 = 5;
    /// Permission denied.
    pub const EACCES: i32 = 13;
    /// File exists.
    pub const EEXIST: i32 = 17;
    /// Not a directory.
    pub const ENOTDIR: i32 = 20;
    /// Is a directory.
    pub const EISDIR: i32 = 21;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// No space left on device.
    pub const ENOSPC: i32 = 28;
    /// Operation not supported.
    pub const ENOTSUP: i32 = 45;
    /// Not connected.
    pub const ENOTCONN: i32 = 57;
    /// Directory not empty.
    pub const ENOTEMPTY: i32 = 66;
}

/// Default POSIX mode bits per item kind.
pub mod mode {
    use super::ItemType;

    /// Regular file: rw-r--r--.
    pub const FILE_REGULAR: u32 = 0o644;
    /// Executable file: rwxr-xr-x.
    pub const FILE_EXECUTABLE: u32 = 0o755;
    /// Directory: rwxr-xr-x.
    pub const DIRECTORY: u32 = 0o755;
    /// Symlink: rwxrwxrwx.
    pub const SYMLINK: u32 = 0o777;

    /// The mode assumed for an item when only its kind is known, e.g. from
    /// a directory listing.
    pub fn default_for(item_type: ItemType) -> u32 {
        match item_type {
            ItemType::File => FILE_REGULAR,
            ItemType::Directory => DIRECTORY,
            ItemType::Symlink => SYMLINK,
        }
    }
}
